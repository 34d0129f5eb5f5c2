//! Specials: hardware that plain assignments cannot express.
//!
//! A [`Special`] wraps a [`SpecialKind`] with a unique [`SpecialId`]. Its
//! [`ports`](Special::ports) list every value it reads or drives together with
//! a direction, which is all elaboration and port inference need to know about
//! it. Kinds are split into those a back end can emit directly and abstract
//! ones that must be lowered first.

use crate::ids::SpecialId;
use crate::memory::Memory;
use crate::signal::Signal;
use crate::visit::{rewrite_value, walk_value};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Direction of a special's port, seen from the special.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// The special reads the value.
    Input,
    /// The special drives the value.
    Output,
    /// The special may do either, as on a pad.
    InOut,
}

/// A port of a special.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecialPort {
    /// Port name within the special.
    pub name: String,
    /// The connected value.
    pub value: Value,
    /// Direction.
    pub direction: PortDirection,
}

impl SpecialPort {
    fn new(name: impl Into<String>, value: impl Into<Value>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction,
        }
    }
}

/// A parameter passed to an instantiated primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Integer parameter.
    Int(i64),
    /// String parameter, emitted quoted.
    Str(String),
    /// Real-valued parameter.
    Float(f64),
}

/// One connection or parameter of an [`Instance`].
#[derive(Clone, Debug, PartialEq)]
pub enum InstanceItem {
    /// Input port.
    Input(String, Value),
    /// Output port.
    Output(String, Value),
    /// Bidirectional port.
    InOut(String, Value),
    /// Parameter.
    Parameter(String, ParamValue),
}

/// An instantiation of an external module or vendor primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    /// The instantiated module's name.
    pub of: String,
    /// Instance name hint; defaults to `of`.
    pub name: Option<String>,
    /// Ports and parameters in declaration order.
    pub items: Vec<InstanceItem>,
}

impl Instance {
    /// An instance of `of` with no connections.
    pub fn new(of: impl Into<String>) -> Self {
        Self {
            of: of.into(),
            name: None,
            items: Vec::new(),
        }
    }

    /// Sets the instance name hint.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Connects an input port.
    pub fn input(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.items.push(InstanceItem::Input(port.into(), value.into()));
        self
    }

    /// Connects an output port.
    pub fn output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.items.push(InstanceItem::Output(port.into(), value.into()));
        self
    }

    /// Connects a bidirectional port.
    pub fn inout(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.items.push(InstanceItem::InOut(port.into(), value.into()));
        self
    }

    /// Sets a parameter.
    pub fn param(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.items.push(InstanceItem::Parameter(name.into(), value));
        self
    }
}

/// A tri-state pad driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tristate {
    /// The pad.
    pub target: Signal,
    /// Value driven when enabled.
    pub o: Value,
    /// Output enable.
    pub oe: Value,
    /// Value read back from the pad.
    pub i: Option<Signal>,
}

/// A multi-flop synchronizer bringing `input` into `odomain`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiReg {
    /// Value from the source domain.
    pub input: Value,
    /// Synchronized copy.
    pub output: Signal,
    /// Destination clock domain.
    pub odomain: String,
    /// Number of flops.
    pub stages: u32,
}

/// Drives a domain's reset from an asynchronous source, releasing it synchronously.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncResetSynchronizer {
    /// Domain whose reset is driven.
    pub domain: String,
    /// Asynchronous reset request.
    pub async_reset: Value,
}

/// A differential input buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DifferentialInput {
    /// Positive pad.
    pub p: Signal,
    /// Negative pad.
    pub n: Signal,
    /// Single-ended result.
    pub output: Signal,
}

/// A differential output buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DifferentialOutput {
    /// Single-ended source.
    pub input: Value,
    /// Positive pad.
    pub p: Signal,
    /// Negative pad.
    pub n: Signal,
}

/// A tool directive emitted verbatim, with `{0}`, `{1}`... replaced by signal names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisDirective {
    /// Directive text.
    pub template: String,
    /// Signals referenced by the template.
    pub signals: Vec<Signal>,
}

/// The kinds of special.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecialKind {
    /// External module or primitive.
    Instance(Instance),
    /// Random-access memory.
    Memory(Memory),
    /// Tri-state driver.
    Tristate(Tristate),
    /// Clock-domain-crossing synchronizer.
    MultiReg(MultiReg),
    /// Reset synchronizer.
    AsyncResetSynchronizer(AsyncResetSynchronizer),
    /// Differential input buffer.
    DifferentialInput(DifferentialInput),
    /// Differential output buffer.
    DifferentialOutput(DifferentialOutput),
    /// Verbatim tool directive.
    SynthesisDirective(SynthesisDirective),
}

/// Discriminant of [`SpecialKind`], used as the key of lowering overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecialTag {
    /// [`SpecialKind::Instance`].
    Instance,
    /// [`SpecialKind::Memory`].
    Memory,
    /// [`SpecialKind::Tristate`].
    Tristate,
    /// [`SpecialKind::MultiReg`].
    MultiReg,
    /// [`SpecialKind::AsyncResetSynchronizer`].
    AsyncResetSynchronizer,
    /// [`SpecialKind::DifferentialInput`].
    DifferentialInput,
    /// [`SpecialKind::DifferentialOutput`].
    DifferentialOutput,
    /// [`SpecialKind::SynthesisDirective`].
    SynthesisDirective,
}

impl SpecialTag {
    /// Returns `true` if a back end can emit this kind without lowering.
    pub fn is_native(self) -> bool {
        matches!(
            self,
            SpecialTag::Instance
                | SpecialTag::Memory
                | SpecialTag::Tristate
                | SpecialTag::SynthesisDirective
        )
    }
}

impl fmt::Display for SpecialTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

macro_rules! impl_from_kind {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for SpecialKind {
                fn from(k: $variant) -> Self {
                    SpecialKind::$variant(k)
                }
            }

            impl From<$variant> for Special {
                fn from(k: $variant) -> Self {
                    Special::new(k)
                }
            }
        )*
    };
}

impl_from_kind!(
    Instance,
    Memory,
    Tristate,
    MultiReg,
    AsyncResetSynchronizer,
    DifferentialInput,
    DifferentialOutput,
    SynthesisDirective
);

/// A special with its identity.
///
/// Clones share the ID, so adding a clone of a special already in a fragment
/// does not duplicate it.
#[derive(Clone, Debug, PartialEq)]
pub struct Special {
    /// Identity.
    pub id: SpecialId,
    /// What it is.
    pub kind: SpecialKind,
}

impl Special {
    /// Wraps `kind` with a fresh ID.
    pub fn new(kind: impl Into<SpecialKind>) -> Self {
        Self {
            id: SpecialId::fresh(),
            kind: kind.into(),
        }
    }

    /// Returns the kind discriminant.
    pub fn tag(&self) -> SpecialTag {
        match &self.kind {
            SpecialKind::Instance(_) => SpecialTag::Instance,
            SpecialKind::Memory(_) => SpecialTag::Memory,
            SpecialKind::Tristate(_) => SpecialTag::Tristate,
            SpecialKind::MultiReg(_) => SpecialTag::MultiReg,
            SpecialKind::AsyncResetSynchronizer(_) => SpecialTag::AsyncResetSynchronizer,
            SpecialKind::DifferentialInput(_) => SpecialTag::DifferentialInput,
            SpecialKind::DifferentialOutput(_) => SpecialTag::DifferentialOutput,
            SpecialKind::SynthesisDirective(_) => SpecialTag::SynthesisDirective,
        }
    }

    /// Every value the special reads or drives.
    pub fn ports(&self) -> Vec<SpecialPort> {
        use PortDirection::{InOut, Input, Output};
        match &self.kind {
            SpecialKind::Instance(inst) => inst
                .items
                .iter()
                .filter_map(|item| match item {
                    InstanceItem::Input(n, v) => Some(SpecialPort::new(n.clone(), v, Input)),
                    InstanceItem::Output(n, v) => Some(SpecialPort::new(n.clone(), v, Output)),
                    InstanceItem::InOut(n, v) => Some(SpecialPort::new(n.clone(), v, InOut)),
                    InstanceItem::Parameter(..) => None,
                })
                .collect(),
            SpecialKind::Memory(mem) => {
                let mut ports = Vec::new();
                for p in &mem.ports {
                    ports.push(SpecialPort::new(format!("{}.adr", p.name), &p.adr, Input));
                    ports.push(SpecialPort::new(format!("{}.dat_r", p.name), &p.dat_r, Output));
                    if let Some(we) = &p.we {
                        ports.push(SpecialPort::new(format!("{}.we", p.name), we, Input));
                    }
                    if let Some(dat_w) = &p.dat_w {
                        ports.push(SpecialPort::new(format!("{}.dat_w", p.name), dat_w, Input));
                    }
                    if let Some(re) = &p.re {
                        ports.push(SpecialPort::new(format!("{}.re", p.name), re, Input));
                    }
                }
                ports
            }
            SpecialKind::Tristate(t) => {
                let mut ports = vec![
                    SpecialPort::new("target", &t.target, InOut),
                    SpecialPort::new("o", &t.o, Input),
                    SpecialPort::new("oe", &t.oe, Input),
                ];
                if let Some(i) = &t.i {
                    ports.push(SpecialPort::new("i", i, Output));
                }
                ports
            }
            SpecialKind::MultiReg(m) => vec![
                SpecialPort::new("i", &m.input, Input),
                SpecialPort::new("o", &m.output, Output),
            ],
            SpecialKind::AsyncResetSynchronizer(a) => vec![
                SpecialPort::new("async_reset", &a.async_reset, Input),
                SpecialPort::new("rst", Value::reset(a.domain.clone()), Output),
            ],
            SpecialKind::DifferentialInput(d) => vec![
                SpecialPort::new("p", &d.p, Input),
                SpecialPort::new("n", &d.n, Input),
                SpecialPort::new("o", &d.output, Output),
            ],
            SpecialKind::DifferentialOutput(d) => vec![
                SpecialPort::new("i", &d.input, Input),
                SpecialPort::new("p", &d.p, Output),
                SpecialPort::new("n", &d.n, Output),
            ],
            SpecialKind::SynthesisDirective(s) => s
                .signals
                .iter()
                .enumerate()
                .map(|(i, sig)| SpecialPort::new(i.to_string(), sig, Input))
                .collect(),
        }
    }

    /// Clock domains the special belongs to or references.
    pub fn clock_domains(&self) -> BTreeSet<String> {
        let mut domains = BTreeSet::new();
        match &self.kind {
            SpecialKind::Memory(mem) => {
                for p in &mem.ports {
                    if !p.async_read || p.we.is_some() {
                        domains.insert(p.domain.clone());
                    }
                }
            }
            SpecialKind::MultiReg(m) => {
                domains.insert(m.odomain.clone());
            }
            SpecialKind::AsyncResetSynchronizer(a) => {
                domains.insert(a.domain.clone());
            }
            _ => {}
        }
        for port in self.ports() {
            walk_value(&port.value, &mut |v| match v {
                Value::ClockSignal { domain } | Value::ResetSignal { domain, .. } => {
                    domains.insert(domain.clone());
                }
                _ => {}
            });
        }
        domains
    }

    /// Rewrites every value-typed field with `f`.
    ///
    /// Fields that must stay plain signals (memory port signals, pads,
    /// synchronizer outputs) are left alone.
    pub fn map_values(&mut self, f: &mut dyn FnMut(&Value) -> Option<Value>) {
        match &mut self.kind {
            SpecialKind::Instance(inst) => {
                for item in &mut inst.items {
                    match item {
                        InstanceItem::Input(_, v)
                        | InstanceItem::Output(_, v)
                        | InstanceItem::InOut(_, v) => *v = rewrite_value(v, f),
                        InstanceItem::Parameter(..) => {}
                    }
                }
            }
            SpecialKind::Tristate(t) => {
                t.o = rewrite_value(&t.o, f);
                t.oe = rewrite_value(&t.oe, f);
            }
            SpecialKind::MultiReg(m) => m.input = rewrite_value(&m.input, f),
            SpecialKind::AsyncResetSynchronizer(a) => {
                a.async_reset = rewrite_value(&a.async_reset, f)
            }
            SpecialKind::DifferentialOutput(d) => d.input = rewrite_value(&d.input, f),
            SpecialKind::Memory(_)
            | SpecialKind::DifferentialInput(_)
            | SpecialKind::SynthesisDirective(_) => {}
        }
    }

    /// Replaces clock domain `old` with `new` in fields and value references.
    pub fn rename_clock_domain(&mut self, old: &str, new: &str) {
        match &mut self.kind {
            SpecialKind::Memory(mem) => {
                for p in &mut mem.ports {
                    if p.domain == old {
                        p.domain = new.to_string();
                    }
                }
            }
            SpecialKind::MultiReg(m) if m.odomain == old => m.odomain = new.to_string(),
            SpecialKind::AsyncResetSynchronizer(a) if a.domain == old => {
                a.domain = new.to_string()
            }
            _ => {}
        }
        self.map_values(&mut |v| crate::visit::rename_domain_ref(v, old, new));
    }

    /// Short human-readable description, e.g. `Memory mem`.
    pub fn describe(&self) -> String {
        match &self.kind {
            SpecialKind::Instance(i) => format!("Instance {}", i.name.as_deref().unwrap_or(&i.of)),
            SpecialKind::Memory(m) => format!("Memory {}", m.name),
            SpecialKind::Tristate(t) => format!("Tristate {}", t.target.name()),
            SpecialKind::MultiReg(m) => format!("MultiReg {}", m.output.name()),
            SpecialKind::AsyncResetSynchronizer(a) => {
                format!("AsyncResetSynchronizer {}", a.domain)
            }
            SpecialKind::DifferentialInput(d) => format!("DifferentialInput {}", d.output.name()),
            SpecialKind::DifferentialOutput(d) => format!("DifferentialOutput {}", d.p.name()),
            SpecialKind::SynthesisDirective(_) => "SynthesisDirective".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PortSpec;

    #[test]
    fn native_tags() {
        assert!(SpecialTag::Instance.is_native());
        assert!(SpecialTag::Memory.is_native());
        assert!(SpecialTag::Tristate.is_native());
        assert!(!SpecialTag::MultiReg.is_native());
        assert!(!SpecialTag::AsyncResetSynchronizer.is_native());
        assert!(!SpecialTag::DifferentialInput.is_native());
    }

    #[test]
    fn clones_share_identity() {
        let s = Special::new(MultiReg {
            input: Value::from(1),
            output: Signal::new("o", 1),
            odomain: "sys".into(),
            stages: 2,
        });
        assert_eq!(s.clone().id, s.id);
        assert_ne!(Special::new(s.kind.clone()).id, s.id);
    }

    #[test]
    fn instance_ports() {
        let a = Signal::new("a", 1);
        let b = Signal::new("b", 1);
        let inst = Instance::new("FOO")
            .input("I", &a)
            .output("O", &b)
            .param("INIT", ParamValue::Int(0));
        let s = Special::new(inst);
        let ports = s.ports();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].direction, PortDirection::Input);
        assert_eq!(ports[1].direction, PortDirection::Output);
        assert_eq!(ports[1].value, Value::from(&b));
    }

    #[test]
    fn memory_ports_and_domains() {
        let mut mem = Memory::new("mem", 8, 4);
        mem.add_port(PortSpec::write("w").domain("fast")).unwrap();
        mem.add_port(PortSpec::read("r").async_read()).unwrap();
        let s = Special::new(mem);
        let outputs = s
            .ports()
            .into_iter()
            .filter(|p| p.direction == PortDirection::Output)
            .count();
        assert_eq!(outputs, 2);
        let domains: Vec<_> = s.clock_domains().into_iter().collect();
        assert_eq!(domains, vec!["fast".to_string()]);
    }

    #[test]
    fn rename_reaches_value_references() {
        let o = Signal::new("o", 1);
        let mut s = Special::new(
            Instance::new("BUFG")
                .input("I", Value::clock("sub"))
                .output("O", &o),
        );
        s.rename_clock_domain("sub", "x_sub");
        let domains: Vec<_> = s.clock_domains().into_iter().collect();
        assert_eq!(domains, vec!["x_sub".to_string()]);
    }

    #[test]
    fn rename_multireg_domain() {
        let mut s = Special::new(MultiReg {
            input: Value::from(1),
            output: Signal::new("o", 1),
            odomain: "sub".into(),
            stages: 2,
        });
        s.rename_clock_domain("sub", "y_sub");
        assert!(s.clock_domains().contains("y_sub"));
        assert!(!s.clock_domains().contains("sub"));
    }

    #[test]
    fn async_reset_synchronizer_drives_reset() {
        let s = Special::new(AsyncResetSynchronizer {
            domain: "sys".into(),
            async_reset: Value::from(Signal::new("locked", 1)),
        });
        let out: Vec<_> = s
            .ports()
            .into_iter()
            .filter(|p| p.direction == PortDirection::Output)
            .collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, Value::reset("sys"));
    }
}
