//! Whole-fragment rewrites attached to a module.
//!
//! A [`Decorator`] is recorded on a [`Module`](crate::Module) while it is
//! built and applied once to the module's merged fragment at the end of
//! `finalize`, so it covers the module's submodules as well.

use kiln_ir::visit::assigned_signals;
use kiln_ir::{Fragment, If, Statement, Value, ValueOps};
use std::collections::BTreeMap;

/// A rewrite applied to a module's complete fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum Decorator {
    /// Registers in `domain` only update while `enable` is high.
    ClockEnable {
        /// Affected domain.
        domain: String,
        /// One-bit enable.
        enable: Value,
    },
    /// Registers in `domain` return to their reset values while `reset` is high.
    Reset {
        /// Affected domain.
        domain: String,
        /// One-bit reset, synchronous to the domain's clock.
        reset: Value,
    },
    /// Renames clock domains, old name to new name, all at once.
    RenameDomains(BTreeMap<String, String>),
}

impl Decorator {
    /// Applies the rewrite in place.
    pub fn apply(&self, fragment: &mut Fragment) {
        match self {
            Decorator::ClockEnable { domain, enable } => {
                if let Some(stmts) = fragment.sync.get_mut(domain) {
                    let body = std::mem::take(stmts);
                    stmts.push(If::new(enable, body).into());
                }
            }
            Decorator::Reset { domain, reset } => {
                if let Some(stmts) = fragment.sync.get_mut(domain) {
                    let clears: Vec<Statement> = assigned_signals(stmts)
                        .into_iter()
                        .filter(|s| !s.is_reset_less())
                        .map(|s| {
                            let reset = s.reset().clone();
                            s.assign(reset)
                        })
                        .collect();
                    if !clears.is_empty() {
                        stmts.push(If::new(reset, clears).into());
                    }
                }
            }
            Decorator::RenameDomains(map) => rename_all(fragment, map),
        }
    }
}

/// Renames through temporary names so that swaps such as `a -> b, b -> a`
/// do not merge the two domains.
fn rename_all(fragment: &mut Fragment, map: &BTreeMap<String, String>) {
    let staged: Vec<(String, &String)> = map
        .iter()
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(i, (old, new))| {
            let tmp = format!("\u{0}rename{i}");
            fragment.rename_clock_domain(old, &tmp);
            (tmp, new)
        })
        .collect();
    for (tmp, new) in staged {
        fragment.rename_clock_domain(&tmp, new);
    }
}
