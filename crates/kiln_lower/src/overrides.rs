//! The lowering strategy trait and the per-target override table.

use crate::generic::{GenericAsyncResetSynchronizer, GenericMultiReg};
use crate::primitive::{
    PrimitiveDifferentialInput, PrimitiveDifferentialOutput, PrimitiveTristate,
};
use kiln_common::{InternalError, KilnResult};
use kiln_ir::{ElabResult, Fragment, Special, SpecialTag};
use std::collections::BTreeMap;
use std::fmt;

/// Replaces one kind of special with ordinary logic or simpler specials.
///
/// Every signal the special drives must still be driven by the result.
/// [`SpecialLowerer`](crate::SpecialLowerer) calls an implementation at most
/// once per special and reuses the result.
pub trait Lowering: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produces the replacement for `special`.
    fn lower(&self, special: &Special) -> ElabResult<Fragment>;
}

/// Lowerings selected per special kind for one target.
///
/// A kind with an entry here is always lowered, even if the back end could
/// emit it natively. A kind with no entry is emitted natively when possible
/// and is an error otherwise.
#[derive(Debug, Default)]
pub struct SpecialOverrides {
    table: BTreeMap<SpecialTag, Box<dyn Lowering>>,
}

impl SpecialOverrides {
    /// An empty table: only natively supported specials are accepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Portable lowerings for the clock-domain-crossing specials.
    pub fn generic() -> Self {
        Self::new()
            .with(SpecialTag::MultiReg, GenericMultiReg)
            .with(SpecialTag::AsyncResetSynchronizer, GenericAsyncResetSynchronizer)
    }

    /// The portable lowerings plus vendor I/O buffer primitives for
    /// differential pairs and tri-state pads.
    pub fn vendor_primitives() -> Self {
        Self::generic()
            .with(SpecialTag::DifferentialInput, PrimitiveDifferentialInput)
            .with(SpecialTag::DifferentialOutput, PrimitiveDifferentialOutput)
            .with(SpecialTag::Tristate, PrimitiveTristate)
    }

    /// Looks up the table for a target by name.
    ///
    /// Supported targets: `"native"`, `"generic"`, `"vendor"`.
    ///
    /// # Errors
    ///
    /// Returns `InternalError` if the target name is not recognized.
    pub fn for_target(target: &str) -> KilnResult<Self> {
        match target.to_ascii_lowercase().as_str() {
            "native" | "none" => Ok(Self::new()),
            "generic" => Ok(Self::generic()),
            "vendor" | "primitives" => Ok(Self::vendor_primitives()),
            _ => Err(InternalError::new(format!(
                "unknown lowering target: {target:?}. Supported: native, generic, vendor"
            ))),
        }
    }

    /// Adds or replaces the lowering for `tag`.
    pub fn with(mut self, tag: SpecialTag, lowering: impl Lowering + 'static) -> Self {
        self.insert(tag, lowering);
        self
    }

    /// Adds or replaces the lowering for `tag` in place.
    pub fn insert(&mut self, tag: SpecialTag, lowering: impl Lowering + 'static) {
        self.table.insert(tag, Box::new(lowering));
    }

    /// The lowering for `tag`, if any.
    pub fn get(&self, tag: SpecialTag) -> Option<&dyn Lowering> {
        self.table.get(&tag).map(|l| l.as_ref())
    }

    /// Returns `true` if `tag` has a lowering.
    pub fn contains(&self, tag: SpecialTag) -> bool {
        self.table.contains_key(&tag)
    }

    /// Kinds with a lowering, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = SpecialTag> + '_ {
        self.table.keys().copied()
    }
}
