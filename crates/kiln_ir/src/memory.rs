//! Memories and their ports.
//!
//! A [`Memory`] is built by adding ports, each of which creates its own
//! address, data and enable signals. The finished memory is wrapped in a
//! [`Special`](crate::special::Special) and added to a module.

use crate::error::{ElabError, ElabResult};
use crate::signal::Signal;
use kiln_common::{bits_for, wrap};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// What a synchronous read returns in a cycle that also writes the same address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteMode {
    /// The word as it was before the write.
    #[default]
    ReadFirst,
    /// The word being written.
    WriteFirst,
    /// The read data register holds its previous value.
    NoChange,
}

/// Options for [`Memory::add_port`].
#[derive(Clone, Debug)]
pub struct PortSpec {
    /// Port name, unique within the memory.
    pub name: String,
    /// Create `we`/`dat_w` signals.
    pub write_capable: bool,
    /// Read combinationally instead of on the clock edge.
    pub async_read: bool,
    /// Create a read-enable signal gating synchronous reads.
    pub has_re: bool,
    /// Read-during-write behavior.
    pub mode: WriteMode,
    /// Bits per write-enable lane; 0 means one enable for the whole word.
    pub we_granularity: u32,
    /// Clock domain of the port.
    pub domain: String,
}

impl PortSpec {
    /// A synchronous read-only port in the `sys` domain.
    pub fn read(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            write_capable: false,
            async_read: false,
            has_re: false,
            mode: WriteMode::ReadFirst,
            we_granularity: 0,
            domain: "sys".to_string(),
        }
    }

    /// A read/write port in the `sys` domain.
    pub fn write(name: impl Into<String>) -> Self {
        Self {
            write_capable: true,
            ..Self::read(name)
        }
    }

    /// Sets the read-during-write mode.
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Makes reads combinational.
    pub fn async_read(mut self) -> Self {
        self.async_read = true;
        self
    }

    /// Adds a read enable.
    pub fn with_re(mut self) -> Self {
        self.has_re = true;
        self
    }

    /// Splits the write enable into lanes of `bits` bits.
    pub fn we_granularity(mut self, bits: u32) -> Self {
        self.we_granularity = bits;
        self
    }

    /// Places the port in `domain`.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}

/// One port of a [`Memory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryPort {
    /// Port name.
    pub name: String,
    /// Address input.
    pub adr: Signal,
    /// Read data output.
    pub dat_r: Signal,
    /// Write enable input, one bit per lane.
    pub we: Option<Signal>,
    /// Write data input.
    pub dat_w: Option<Signal>,
    /// Read enable input.
    pub re: Option<Signal>,
    /// Read-during-write behavior.
    pub mode: WriteMode,
    /// Combinational read.
    pub async_read: bool,
    /// Bits per write-enable lane; 0 means the whole word.
    pub we_granularity: u32,
    /// Clock domain.
    pub domain: String,
}

impl MemoryPort {
    /// Number of write-enable lanes.
    pub fn lanes(&self, width: u32) -> u32 {
        if self.we_granularity == 0 || self.we_granularity >= width {
            1
        } else {
            width / self.we_granularity
        }
    }
}

/// A random-access memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    /// Name hint.
    pub name: String,
    /// Bits per word.
    pub width: u32,
    /// Number of words.
    pub depth: usize,
    /// Initial contents, shorter than `depth` means the rest are zero.
    pub init: Vec<BigInt>,
    /// Ports in creation order.
    pub ports: Vec<MemoryPort>,
}

impl Memory {
    /// Creates a memory with no ports and zeroed contents.
    pub fn new(name: impl Into<String>, width: u32, depth: usize) -> Self {
        Self {
            name: name.into(),
            width,
            depth,
            init: Vec::new(),
            ports: Vec::new(),
        }
    }

    /// Sets the initial contents, each word truncated to the memory width.
    pub fn with_init<V: Into<BigInt>>(mut self, init: impl IntoIterator<Item = V>) -> Self {
        self.init = init
            .into_iter()
            .take(self.depth)
            .map(|v| wrap(&v.into(), self.width, false))
            .collect();
        self
    }

    /// Width of the address bus.
    pub fn address_width(&self) -> u32 {
        bits_for(&BigInt::from(self.depth.saturating_sub(1)), false)
    }

    /// Adds a port and returns a copy of it holding its signals.
    pub fn add_port(&mut self, spec: PortSpec) -> ElabResult<MemoryPort> {
        if self.ports.iter().any(|p| p.name == spec.name) {
            return Err(ElabError::DuplicatePort {
                owner: self.name.clone(),
                port: spec.name,
            });
        }
        if spec.write_capable && spec.we_granularity != 0 && self.width % spec.we_granularity != 0 {
            return Err(ElabError::MalformedExpression {
                position: format!("{}.{}", self.name, spec.name),
                detail: format!(
                    "write granularity {} does not divide width {}",
                    spec.we_granularity, self.width
                ),
            });
        }
        let prefix = format!("{}_{}", self.name, spec.name);
        let mut port = MemoryPort {
            name: spec.name,
            adr: Signal::new(format!("{prefix}_adr"), self.address_width()),
            dat_r: Signal::new(format!("{prefix}_dat_r"), self.width),
            we: None,
            dat_w: None,
            re: spec
                .has_re
                .then(|| Signal::new(format!("{prefix}_re"), 1)),
            mode: spec.mode,
            async_read: spec.async_read,
            we_granularity: spec.we_granularity,
            domain: spec.domain,
        };
        if spec.write_capable {
            let lanes = port.lanes(self.width);
            port.we = Some(Signal::new(format!("{prefix}_we"), lanes));
            port.dat_w = Some(Signal::new(format!("{prefix}_dat_w"), self.width));
        }
        self.ports.push(port.clone());
        Ok(port)
    }

    /// Returns the port named `name`.
    pub fn port(&self, name: &str) -> Option<&MemoryPort> {
        self.ports.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_width() {
        assert_eq!(Memory::new("m", 8, 4).address_width(), 2);
        assert_eq!(Memory::new("m", 8, 5).address_width(), 3);
        assert_eq!(Memory::new("m", 8, 1).address_width(), 1);
    }

    #[test]
    fn add_port_creates_signals() {
        let mut mem = Memory::new("mem", 16, 8);
        let w = mem.add_port(PortSpec::write("w").we_granularity(8)).unwrap();
        assert_eq!(w.adr.width(), 3);
        assert_eq!(w.dat_r.width(), 16);
        assert_eq!(w.we.as_ref().map(Signal::width), Some(2));
        assert_eq!(w.dat_w.as_ref().map(Signal::width), Some(16));
        assert_eq!(w.adr.name(), "mem_w_adr");

        let r = mem.add_port(PortSpec::read("r").with_re()).unwrap();
        assert!(r.we.is_none());
        assert!(r.re.is_some());
        assert_eq!(mem.ports.len(), 2);
    }

    #[test]
    fn duplicate_port_rejected() {
        let mut mem = Memory::new("mem", 8, 4);
        mem.add_port(PortSpec::read("p")).unwrap();
        let err = mem.add_port(PortSpec::write("p")).unwrap_err();
        assert_eq!(
            err,
            ElabError::DuplicatePort {
                owner: "mem".into(),
                port: "p".into()
            }
        );
    }

    #[test]
    fn bad_granularity_rejected() {
        let mut mem = Memory::new("mem", 12, 4);
        assert!(mem.add_port(PortSpec::write("w").we_granularity(5)).is_err());
    }

    #[test]
    fn init_is_truncated() {
        let mem = Memory::new("mem", 4, 2).with_init([17, 3, 9]);
        assert_eq!(mem.init, vec![BigInt::from(1), BigInt::from(3)]);
    }

    #[test]
    fn write_mode_default() {
        assert_eq!(PortSpec::read("r").mode, WriteMode::ReadFirst);
    }
}
