//! Clock domains.

use crate::signal::Signal;

/// A named group of registers sharing one clock and, optionally, one reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockDomain {
    /// Name, unique within the fragment that declares it.
    pub name: String,
    /// Clock signal.
    pub clk: Signal,
    /// Reset signal; `None` for a reset-less domain.
    pub rst: Option<Signal>,
    /// Reset acts immediately rather than on the next clock edge.
    pub async_reset: bool,
}

impl ClockDomain {
    /// A domain with a synchronous reset and signals named `<name>_clk`/`<name>_rst`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            clk: Signal::new(format!("{name}_clk"), 1),
            rst: Some(Signal::new(format!("{name}_rst"), 1)),
            name,
            async_reset: false,
        }
    }

    /// A domain without a reset.
    pub fn reset_less(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            clk: Signal::new(format!("{name}_clk"), 1),
            rst: None,
            name,
            async_reset: false,
        }
    }

    /// Makes the reset asynchronous.
    pub fn with_async_reset(mut self) -> Self {
        self.async_reset = true;
        self
    }

    /// Renames the domain. Its clock and reset signals are unchanged.
    pub fn rename(&mut self, new_name: impl Into<String>) {
        self.name = new_name.into();
    }
}
