//! The flat intermediate form of an elaborated module.
//!
//! A [`Fragment`] is what every module reduces to. Fragments combine with
//! `+`, which concatenates statement lists, merges synchronous lists per
//! domain, unions specials by identity and appends clock domains. `+` is
//! associative and `Fragment::default()` is its identity.

use crate::domain::ClockDomain;
use crate::error::{ElabError, ElabResult};
use crate::ids::SpecialId;
use crate::signal::Signal;
use crate::special::{PortDirection, Special};
use crate::stmt::Statement;
use crate::value::Value;
use crate::visit::{
    assigned_signals, for_each_target, for_each_value, is_valid_target, rename_domain_ref,
    rewrite_statements, target_signals, walk_value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Combinational and synchronous logic, specials and clock domains.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    /// Combinational statements, in order.
    pub comb: Vec<Statement>,
    /// Synchronous statements keyed by clock domain name.
    pub sync: BTreeMap<String, Vec<Statement>>,
    /// Specials keyed by identity.
    pub specials: BTreeMap<SpecialId, Special>,
    /// Declared clock domains.
    pub clock_domains: Vec<ClockDomain>,
}

impl Fragment {
    /// An empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends combinational statements.
    pub fn add_comb(&mut self, stmts: impl IntoIterator<Item = Statement>) {
        self.comb.extend(stmts);
    }

    /// Appends synchronous statements to `domain`.
    pub fn add_sync(&mut self, domain: impl Into<String>, stmts: impl IntoIterator<Item = Statement>) {
        self.sync.entry(domain.into()).or_default().extend(stmts);
    }

    /// Adds a special; adding the same special twice has no effect.
    pub fn add_special(&mut self, special: Special) {
        self.specials.entry(special.id).or_insert(special);
    }

    /// Declares a clock domain.
    pub fn add_clock_domain(&mut self, domain: ClockDomain) {
        self.clock_domains.push(domain);
    }

    /// Returns `true` if the fragment holds nothing.
    pub fn is_empty(&self) -> bool {
        self.comb.is_empty()
            && self.sync.values().all(Vec::is_empty)
            && self.specials.is_empty()
            && self.clock_domains.is_empty()
    }

    /// Returns the declared domain called `name`.
    pub fn clock_domain(&self, name: &str) -> Option<&ClockDomain> {
        self.clock_domains.iter().find(|cd| cd.name == name)
    }

    /// Names of declared clock domains.
    pub fn declared_domains(&self) -> BTreeSet<String> {
        self.clock_domains.iter().map(|cd| cd.name.clone()).collect()
    }

    /// Names of clock domains the logic and specials use.
    ///
    /// A domain is used when it has synchronous statements, is referenced
    /// by a `ClockSignal`/`ResetSignal`, or hosts a special.
    pub fn used_domains(&self) -> BTreeSet<String> {
        let mut used: BTreeSet<String> = self
            .sync
            .iter()
            .filter(|(_, stmts)| !stmts.is_empty())
            .map(|(d, _)| d.clone())
            .collect();
        let mut collect = |v: &Value| {
            walk_value(v, &mut |n| match n {
                Value::ClockSignal { domain } | Value::ResetSignal { domain, .. } => {
                    used.insert(domain.clone());
                }
                _ => {}
            })
        };
        for_each_value(&self.comb, &mut collect);
        for stmts in self.sync.values() {
            for_each_value(stmts, &mut collect);
        }
        for special in self.specials.values() {
            used.extend(special.clock_domains());
        }
        used
    }

    /// Renames clock domain `old` to `new` everywhere: synchronous lists,
    /// clock/reset references, declared domains and specials.
    pub fn rename_clock_domain(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        let mut rename = |v: &Value| rename_domain_ref(v, old, new);
        self.comb = rewrite_statements(&self.comb, &mut rename);
        let sync = std::mem::take(&mut self.sync);
        for (domain, stmts) in sync {
            let stmts = rewrite_statements(&stmts, &mut rename);
            let key = if domain == old { new.to_string() } else { domain };
            self.sync.entry(key).or_default().extend(stmts);
        }
        for cd in &mut self.clock_domains {
            if cd.name == old {
                cd.rename(new);
            }
        }
        for special in self.specials.values_mut() {
            special.rename_clock_domain(old, new);
        }
    }

    /// Signals driven by statements or by special outputs.
    pub fn driven_signals(&self) -> BTreeSet<Signal> {
        let mut driven = assigned_signals(&self.comb);
        for stmts in self.sync.values() {
            driven.extend(assigned_signals(stmts));
        }
        for special in self.specials.values() {
            for port in special.ports() {
                if port.direction != PortDirection::Input {
                    target_signals(&port.value, &mut driven);
                }
            }
        }
        driven
    }

    /// Checks that every signal has at most one driver.
    ///
    /// Several combinational statements may assign the same signal, and so
    /// may several statements of one synchronous domain. A signal driven
    /// from two domains, from both combinational and synchronous logic, or
    /// by a special and anything else is rejected. Assignment targets that
    /// cannot be driven are rejected too.
    pub fn check_drivers(&self) -> ElabResult<()> {
        let mut owner: BTreeMap<Signal, String> = BTreeMap::new();
        let mut claim = |signals: BTreeSet<Signal>, who: String| -> ElabResult<()> {
            for s in signals {
                match owner.get(&s) {
                    Some(prev) if *prev != who || who.starts_with("special") => {
                        return Err(ElabError::DriverConflict {
                            signal: s.name().to_string(),
                            first: prev.clone(),
                            second: who,
                        });
                    }
                    Some(_) => {}
                    None => {
                        owner.insert(s, who.clone());
                    }
                }
            }
            Ok(())
        };

        check_targets(&self.comb)?;
        claim(assigned_signals(&self.comb), "comb".to_string())?;
        for (domain, stmts) in &self.sync {
            check_targets(stmts)?;
            claim(assigned_signals(stmts), format!("sync domain `{domain}`"))?;
        }
        for special in self.specials.values() {
            let mut outputs = BTreeSet::new();
            for port in special.ports() {
                if port.direction != PortDirection::Input {
                    target_signals(&port.value, &mut outputs);
                }
            }
            claim(outputs, format!("special {}", special.describe()))?;
        }
        Ok(())
    }

    /// Checks that no clock domain is declared twice.
    pub fn check_clock_domains(&self) -> ElabResult<()> {
        let mut seen = BTreeSet::new();
        for cd in &self.clock_domains {
            if !seen.insert(cd.name.as_str()) {
                return Err(ElabError::DuplicateClockDomain {
                    domain: cd.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn check_targets(stmts: &[Statement]) -> ElabResult<()> {
    let mut bad = None;
    for_each_target(stmts, &mut |target| {
        if bad.is_none() && !is_valid_target(target) {
            bad = Some(target.to_string());
        }
    });
    match bad {
        Some(target) => Err(ElabError::InvalidAssignTarget { target }),
        None => Ok(()),
    }
}

impl AddAssign for Fragment {
    fn add_assign(&mut self, other: Fragment) {
        self.comb.extend(other.comb);
        for (domain, stmts) in other.sync {
            self.sync.entry(domain).or_default().extend(stmts);
        }
        for (id, special) in other.specials {
            self.specials.entry(id).or_insert(special);
        }
        self.clock_domains.extend(other.clock_domains);
    }
}

impl Add for Fragment {
    type Output = Fragment;

    fn add(mut self, other: Fragment) -> Fragment {
        self += other;
        self
    }
}

impl Sum for Fragment {
    fn sum<I: Iterator<Item = Fragment>>(iter: I) -> Fragment {
        iter.fold(Fragment::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::special::{Instance, MultiReg};
    use crate::value::ValueOps;

    fn sample(name: &str) -> Fragment {
        let a = Signal::new(format!("{name}_a"), 4);
        let b = Signal::new(format!("{name}_b"), 4);
        let mut f = Fragment::new();
        f.add_comb([b.clone().assign(&a + 1)]);
        f.add_sync("sys", [a.clone().assign(&b)]);
        f
    }

    #[test]
    fn identity() {
        let x = sample("x");
        assert_eq!(x.clone() + Fragment::default(), x);
        assert_eq!(Fragment::default() + x.clone(), x);
    }

    #[test]
    fn associative() {
        let (x, y, z) = (sample("x"), sample("y"), sample("z"));
        assert_eq!(
            (x.clone() + y.clone()) + z.clone(),
            x + (y + z)
        );
    }

    #[test]
    fn specials_dedup_by_identity() {
        let o = Signal::new("o", 1);
        let sp = Special::new(Instance::new("FOO").output("O", &o));
        let mut f = Fragment::new();
        f.add_special(sp.clone());
        f.add_special(sp.clone());
        assert_eq!(f.specials.len(), 1);
        let g = f.clone() + f;
        assert_eq!(g.specials.len(), 1);
    }

    #[test]
    fn sum_folds() {
        let total: Fragment = vec![sample("a"), sample("b")].into_iter().sum();
        assert_eq!(total.comb.len(), 2);
        assert_eq!(total.sync["sys"].len(), 2);
    }

    #[test]
    fn rename_leaves_no_trace() {
        let q = Signal::new("q", 1);
        let o = Signal::new("o", 1);
        let mut f = Fragment::new();
        f.add_clock_domain(ClockDomain::new("sub"));
        f.add_sync("sub", [q.clone().assign(Value::reset("sub"))]);
        f.add_comb([o.clone().assign(Value::clock("sub"))]);
        f.add_special(Special::new(MultiReg {
            input: Value::from(&q),
            output: Signal::new("m", 1),
            odomain: "sub".into(),
            stages: 2,
        }));
        f.rename_clock_domain("sub", "x_sub");
        assert!(!f.sync.contains_key("sub"));
        assert!(f.sync.contains_key("x_sub"));
        assert_eq!(f.clock_domains[0].name, "x_sub");
        let used = f.used_domains();
        assert!(used.contains("x_sub"));
        assert!(!used.contains("sub"));
    }

    #[test]
    fn comb_and_sync_conflict() {
        let a = Signal::new("a", 1);
        let mut f = Fragment::new();
        f.add_comb([a.clone().assign(1)]);
        f.add_sync("sys", [a.clone().assign(0)]);
        let err = f.check_drivers().unwrap_err();
        assert!(matches!(err, ElabError::DriverConflict { ref signal, .. } if signal == "a"));
    }

    #[test]
    fn two_domains_conflict() {
        let a = Signal::new("a", 1);
        let mut f = Fragment::new();
        f.add_sync("sys", [a.clone().assign(1)]);
        f.add_sync("io", [a.clone().assign(0)]);
        assert!(f.check_drivers().is_err());
    }

    #[test]
    fn special_and_comb_conflict() {
        let o = Signal::new("o", 1);
        let mut f = Fragment::new();
        f.add_comb([o.clone().assign(1)]);
        f.add_special(Special::new(Instance::new("FOO").output("O", &o)));
        assert!(f.check_drivers().is_err());
    }

    #[test]
    fn repeated_comb_assignments_allowed() {
        let a = Signal::new("a", 2);
        let mut f = Fragment::new();
        f.add_comb([a.clone().assign(0), a.clone().assign(1)]);
        f.add_sync("sys", [Signal::new("r", 1).assign(&a)]);
        assert!(f.check_drivers().is_ok());
    }

    #[test]
    fn invalid_target_rejected() {
        let a = Signal::new("a", 2);
        let mut f = Fragment::new();
        f.add_comb([(&a + 1).assign(0)]);
        assert!(matches!(
            f.check_drivers(),
            Err(ElabError::InvalidAssignTarget { .. })
        ));
    }

    #[test]
    fn duplicate_domain_rejected() {
        let mut f = Fragment::new();
        f.add_clock_domain(ClockDomain::new("sys"));
        f.add_clock_domain(ClockDomain::new("sys"));
        assert!(matches!(
            f.check_clock_domains(),
            Err(ElabError::DuplicateClockDomain { .. })
        ));
    }

    #[test]
    fn driven_includes_special_outputs() {
        let o = Signal::new("o", 1);
        let mut f = Fragment::new();
        f.add_special(Special::new(Instance::new("FOO").output("O", &o)));
        assert!(f.driven_signals().contains(&o));
    }
}
