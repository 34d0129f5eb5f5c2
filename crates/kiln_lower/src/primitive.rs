//! Lowerings onto vendor I/O buffer primitives.
//!
//! These map pad-level specials onto the buffer cells most FPGA vendor
//! libraries provide under these names (`IBUFDS`, `OBUFDS`, `IOBUF`).

use crate::overrides::Lowering;
use kiln_ir::{ElabError, ElabResult, Fragment, Instance, Special, SpecialKind};

fn unexpected(lowering: &str, special: &Special) -> ElabError {
    ElabError::UnsupportedSpecial {
        special: special.describe(),
        reason: format!("`{lowering}` cannot lower this kind"),
    }
}

fn single(instance: Instance) -> Fragment {
    let mut fragment = Fragment::new();
    fragment.add_special(Special::new(instance));
    fragment
}

/// Differential input through an `IBUFDS`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimitiveDifferentialInput;

impl Lowering for PrimitiveDifferentialInput {
    fn name(&self) -> &str {
        "ibufds"
    }

    fn lower(&self, special: &Special) -> ElabResult<Fragment> {
        let SpecialKind::DifferentialInput(d) = &special.kind else {
            return Err(unexpected(self.name(), special));
        };
        Ok(single(
            Instance::new("IBUFDS")
                .input("I", &d.p)
                .input("IB", &d.n)
                .output("O", &d.output),
        ))
    }
}

/// Differential output through an `OBUFDS`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimitiveDifferentialOutput;

impl Lowering for PrimitiveDifferentialOutput {
    fn name(&self) -> &str {
        "obufds"
    }

    fn lower(&self, special: &Special) -> ElabResult<Fragment> {
        let SpecialKind::DifferentialOutput(d) = &special.kind else {
            return Err(unexpected(self.name(), special));
        };
        Ok(single(
            Instance::new("OBUFDS")
                .input("I", &d.input)
                .output("O", &d.p)
                .output("OB", &d.n),
        ))
    }
}

/// Tri-state pad through an `IOBUF`, whose `T` input is an active-high
/// output disable.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimitiveTristate;

impl Lowering for PrimitiveTristate {
    fn name(&self) -> &str {
        "iobuf"
    }

    fn lower(&self, special: &Special) -> ElabResult<Fragment> {
        let SpecialKind::Tristate(t) = &special.kind else {
            return Err(unexpected(self.name(), special));
        };
        let mut buf = Instance::new("IOBUF")
            .input("I", &t.o)
            .input("T", !&t.oe);
        if let Some(i) = &t.i {
            buf = buf.output("O", i);
        }
        Ok(single(buf.inout("IO", &t.target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::{
        DifferentialInput, DifferentialOutput, InstanceItem, PortDirection, Signal, Tristate, Value,
    };

    fn only_instance(f: &Fragment) -> &Instance {
        assert_eq!(f.specials.len(), 1);
        match &f.specials.values().next().unwrap().kind {
            SpecialKind::Instance(i) => i,
            other => panic!("expected instance, got {other:?}"),
        }
    }

    #[test]
    fn differential_input_uses_ibufds() {
        let (p, n, o) = (Signal::new("p", 1), Signal::new("n", 1), Signal::new("o", 1));
        let special = Special::new(DifferentialInput {
            p: p.clone(),
            n: n.clone(),
            output: o.clone(),
        });
        let f = PrimitiveDifferentialInput.lower(&special).unwrap();
        let inst = only_instance(&f);
        assert_eq!(inst.of, "IBUFDS");
        assert_eq!(
            inst.items,
            vec![
                InstanceItem::Input("I".into(), p.into()),
                InstanceItem::Input("IB".into(), n.into()),
                InstanceItem::Output("O".into(), o.into()),
            ]
        );
    }

    #[test]
    fn differential_output_uses_obufds() {
        let special = Special::new(DifferentialOutput {
            input: Value::from(Signal::new("d", 1)),
            p: Signal::new("p", 1),
            n: Signal::new("n", 1),
        });
        let f = PrimitiveDifferentialOutput.lower(&special).unwrap();
        assert_eq!(only_instance(&f).of, "OBUFDS");
    }

    #[test]
    fn tristate_inverts_enable() {
        let pad = Signal::new("pad", 8);
        let oe = Signal::new("oe", 1);
        let special = Special::new(Tristate {
            target: pad.clone(),
            o: Signal::new("o", 8).into(),
            oe: oe.clone().into(),
            i: Some(Signal::new("i", 8)),
        });
        let f = PrimitiveTristate.lower(&special).unwrap();
        let lowered = f.specials.values().next().unwrap();
        let ports = lowered.ports();
        let t = ports.iter().find(|p| p.name == "T").unwrap();
        assert_eq!(t.value, !&oe);
        let io = ports.iter().find(|p| p.name == "IO").unwrap();
        assert_eq!(io.direction, PortDirection::InOut);
        assert_eq!(io.value, Value::from(&pad));
        assert!(ports.iter().any(|p| p.name == "O"));
    }

    #[test]
    fn tristate_without_readback() {
        let special = Special::new(Tristate {
            target: Signal::new("pad", 1),
            o: Value::from(1),
            oe: Value::from(true),
            i: None,
        });
        let f = PrimitiveTristate.lower(&special).unwrap();
        assert!(only_instance(&f)
            .items
            .iter()
            .all(|item| !matches!(item, InstanceItem::Output(..))));
    }
}
