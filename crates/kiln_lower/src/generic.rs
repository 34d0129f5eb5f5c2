//! Portable lowerings built from ordinary registers.

use crate::overrides::Lowering;
use kiln_ir::{
    ClockDomain, ElabError, ElabResult, Fragment, Signal, Special, SpecialKind, Value, ValueOps,
};

fn unexpected(lowering: &str, special: &Special) -> ElabError {
    ElabError::UnsupportedSpecial {
        special: special.describe(),
        reason: format!("`{lowering}` cannot lower this kind"),
    }
}

/// A chain of reset-less flip-flops in the destination domain.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericMultiReg;

impl Lowering for GenericMultiReg {
    fn name(&self) -> &str {
        "generic_multireg"
    }

    fn lower(&self, special: &Special) -> ElabResult<Fragment> {
        let SpecialKind::MultiReg(m) = &special.kind else {
            return Err(unexpected(self.name(), special));
        };
        if m.stages == 0 {
            return Err(ElabError::UnsupportedSpecial {
                special: special.describe(),
                reason: "a synchronizer needs at least one stage".into(),
            });
        }
        let shape = m.input.shape();
        let mut fragment = Fragment::new();
        let mut src = m.input.clone();
        let mut sync = Vec::with_capacity(m.stages as usize);
        for i in 0..m.stages {
            let reg = Signal::new(format!("{}_multireg{i}", m.output.name()), shape)
                .with_reset(m.output.reset().clone())
                .reset_less();
            sync.push(reg.clone().assign(src));
            src = Value::from(reg);
        }
        fragment.add_sync(m.odomain.clone(), sync);
        fragment.add_comb([m.output.clone().assign(src)]);
        Ok(fragment)
    }
}

/// Asserts a domain's reset asynchronously and releases it on a clock edge.
///
/// Two flops in a derived domain `<domain>_arst` share the target domain's
/// clock and are preset by the asynchronous source; the second one drives
/// the target domain's reset.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericAsyncResetSynchronizer;

impl Lowering for GenericAsyncResetSynchronizer {
    fn name(&self) -> &str {
        "generic_async_reset_synchronizer"
    }

    fn lower(&self, special: &Special) -> ElabResult<Fragment> {
        let SpecialKind::AsyncResetSynchronizer(a) = &special.kind else {
            return Err(unexpected(self.name(), special));
        };
        let derived = ClockDomain::new(format!("{}_arst", a.domain)).with_async_reset();
        let meta = Signal::new(format!("{}_rst_meta", a.domain), 1).with_reset(1);
        let out = Signal::new(format!("{}_rst_sync", a.domain), 1).with_reset(1);

        let mut fragment = Fragment::new();
        fragment.add_comb([derived.clk.clone().assign(Value::clock(a.domain.clone()))]);
        if let Some(rst) = &derived.rst {
            fragment.add_comb([rst.clone().assign(&a.async_reset)]);
        }
        fragment.add_sync(
            derived.name.clone(),
            [meta.clone().assign(0), out.clone().assign(&meta)],
        );
        fragment.add_comb([Value::reset(a.domain.clone()).assign(&out)]);
        fragment.add_clock_domain(derived);
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::{AsyncResetSynchronizer, MultiReg, Tristate};

    #[test]
    fn multireg_builds_chain() {
        let i = Signal::new("async_in", 3);
        let o = Signal::new("synced", 3).with_reset(2);
        let special = Special::new(MultiReg {
            input: i.clone().into(),
            output: o.clone(),
            odomain: "dst".into(),
            stages: 2,
        });
        let f = GenericMultiReg.lower(&special).unwrap();
        let sync = &f.sync["dst"];
        assert_eq!(sync.len(), 2);
        let regs: Vec<Signal> = sync
            .iter()
            .map(|st| match st {
                kiln_ir::Statement::Assign { lhs, .. } => lhs.as_signal().unwrap().clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(regs.iter().all(|r| r.is_reset_less() && r.width() == 3));
        assert_eq!(regs[0].reset(), o.reset());
        assert_eq!(sync[0], regs[0].clone().assign(&i));
        assert_eq!(sync[1], regs[1].clone().assign(&regs[0]));
        assert_eq!(f.comb, vec![o.assign(&regs[1])]);
        assert!(f.specials.is_empty());
    }

    #[test]
    fn multireg_without_stages_rejected() {
        let special = Special::new(MultiReg {
            input: Value::from(1),
            output: Signal::new("o", 1),
            odomain: "sys".into(),
            stages: 0,
        });
        assert!(matches!(
            GenericMultiReg.lower(&special),
            Err(ElabError::UnsupportedSpecial { .. })
        ));
    }

    #[test]
    fn async_reset_synchronizer_drives_reset() {
        let trigger = Signal::new("pll_unlocked", 1);
        let special = Special::new(AsyncResetSynchronizer {
            domain: "sys".into(),
            async_reset: trigger.into(),
        });
        let f = GenericAsyncResetSynchronizer.lower(&special).unwrap();
        assert_eq!(f.clock_domains.len(), 1);
        let cd = &f.clock_domains[0];
        assert_eq!(cd.name, "sys_arst");
        assert!(cd.async_reset);
        assert_eq!(f.sync["sys_arst"].len(), 2);
        assert!(f.comb.iter().any(|st| matches!(
            st,
            kiln_ir::Statement::Assign { lhs: Value::ResetSignal { domain, .. }, .. } if domain == "sys"
        )));
    }

    #[test]
    fn wrong_kind_rejected() {
        let special = Special::new(Tristate {
            target: Signal::new("pad", 1),
            o: Value::from(0),
            oe: Value::from(0),
            i: None,
        });
        assert!(GenericMultiReg.lower(&special).is_err());
        assert!(GenericAsyncResetSynchronizer.lower(&special).is_err());
    }
}
