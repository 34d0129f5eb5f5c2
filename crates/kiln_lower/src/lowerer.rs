//! Rewriting a fragment until only natively emitted specials remain.

use crate::overrides::SpecialOverrides;
use kiln_ir::visit::{for_each_target, target_signals};
use kiln_ir::{ElabError, ElabResult, Fragment, PortDirection, Special, SpecialId, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, debug_span, trace};

/// Rounds allowed before lowering is considered divergent.
pub const DEFAULT_MAX_ROUNDS: usize = 16;

/// Applies a [`SpecialOverrides`] table to fragments.
///
/// Results are memoized per special, so lowering the same special twice
/// returns the same fragment with the same signals.
#[derive(Debug)]
pub struct SpecialLowerer<'a> {
    overrides: &'a SpecialOverrides,
    cache: HashMap<SpecialId, Fragment>,
    max_rounds: usize,
}

impl<'a> SpecialLowerer<'a> {
    /// Creates a lowerer for one conversion.
    pub fn new(overrides: &'a SpecialOverrides) -> Self {
        Self {
            overrides,
            cache: HashMap::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Sets the number of rounds allowed before giving up.
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Returns `true` if `special` will be replaced rather than emitted.
    pub fn needs_lowering(&self, special: &Special) -> bool {
        self.overrides.contains(special.tag())
    }

    /// Lowers one special, checking that its outputs survive.
    ///
    /// # Errors
    ///
    /// `MissingLowering` if the kind has no entry in the overrides,
    /// `LoweringLostPort` if the replacement no longer drives an output,
    /// or whatever the lowering itself reports.
    pub fn lower_special(&mut self, special: &Special) -> ElabResult<Fragment> {
        if let Some(done) = self.cache.get(&special.id) {
            trace!(special = %special.describe(), "reusing lowered special");
            return Ok(done.clone());
        }
        let lowering =
            self.overrides
                .get(special.tag())
                .ok_or_else(|| ElabError::MissingLowering {
                    special: special.describe(),
                })?;
        debug!(special = %special.describe(), lowering = lowering.name(), "lowering special");
        let fragment = lowering.lower(special)?;
        check_outputs(special, &fragment)?;
        self.cache.insert(special.id, fragment.clone());
        Ok(fragment)
    }

    /// Replaces every overridden special in `fragment` until none remain.
    ///
    /// # Errors
    ///
    /// `MissingLowering` for a special the target cannot emit and no
    /// override covers, `LoweringDidNotConverge` if overrides keep producing
    /// specials that need lowering.
    pub fn lower_fragment(&mut self, mut fragment: Fragment) -> ElabResult<Fragment> {
        let _span = debug_span!("lower_specials").entered();
        for round in 0..self.max_rounds {
            let (pending, kept): (Vec<Special>, Vec<Special>) = std::mem::take(&mut fragment.specials)
                .into_values()
                .partition(|s| self.needs_lowering(s));
            if let Some(bad) = kept.iter().find(|s| !s.tag().is_native()) {
                return Err(ElabError::MissingLowering {
                    special: bad.describe(),
                });
            }
            fragment.specials = kept.into_iter().map(|s| (s.id, s)).collect();
            if pending.is_empty() {
                debug!(rounds = round, "special lowering converged");
                return Ok(fragment);
            }
            for special in &pending {
                fragment += self.lower_special(special)?;
            }
        }
        Err(ElabError::LoweringDidNotConverge {
            rounds: self.max_rounds,
        })
    }
}

/// Checks that every output of `special` is still driven by `replacement`.
fn check_outputs(special: &Special, replacement: &Fragment) -> ElabResult<()> {
    let driven = replacement.driven_signals();
    let mut reset_targets = BTreeSet::new();
    let mut collect = |target: &Value| {
        if let Value::ResetSignal { domain, .. } = target {
            reset_targets.insert(domain.clone());
        }
    };
    for_each_target(&replacement.comb, &mut collect);
    for stmts in replacement.sync.values() {
        for_each_target(stmts, &mut collect);
    }

    for port in special.ports() {
        if port.direction == PortDirection::Input {
            continue;
        }
        let lost = match &port.value {
            Value::ResetSignal { domain, .. } => !reset_targets.contains(domain),
            value => {
                let mut needed = BTreeSet::new();
                target_signals(value, &mut needed);
                !needed.is_subset(&driven)
            }
        };
        if lost {
            return Err(ElabError::LoweringLostPort {
                special: special.describe(),
                port: port.name,
            });
        }
    }
    Ok(())
}
