//! Named hardware wires and registers.
//!
//! A [`Signal`] is a cheap, clonable handle. Clones share one identity, so a
//! signal can be referenced from many statements, specials and modules
//! while still being recognised as the same net during elaboration.

use crate::ids::SignalId;
use crate::shape::Shape;
use kiln_common::wrap;
use num_bigint::BigInt;
use num_traits::Zero;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone)]
struct SignalData {
    id: SignalId,
    name: String,
    shape: Shape,
    reset: BigInt,
    reset_less: bool,
}

/// A named, sized hardware wire or register.
///
/// Equality, ordering and hashing use only the [`SignalId`], which is
/// allocated when the signal is created.
#[derive(Clone)]
pub struct Signal(Arc<SignalData>);

impl Signal {
    /// Creates a signal with reset value zero.
    pub fn new(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self(Arc::new(SignalData {
            id: SignalId::fresh(),
            name: name.into(),
            shape: shape.into(),
            reset: BigInt::zero(),
            reset_less: false,
        }))
    }

    /// Creates a signal sized to hold every integer in `min..max`.
    pub fn range(name: impl Into<String>, min: impl Into<BigInt>, max: impl Into<BigInt>) -> Self {
        Self::new(name, Shape::from_range(min, max))
    }

    /// Creates a new signal with the shape, reset value and reset behavior of `other`.
    pub fn like(other: &Signal, name: impl Into<String>) -> Self {
        Self(Arc::new(SignalData {
            id: SignalId::fresh(),
            name: name.into(),
            ..(*other.0).clone()
        }))
    }

    /// Sets the reset value, truncated to the signal's shape.
    ///
    /// Intended for use while building the signal, before it is cloned.
    pub fn with_reset(mut self, reset: impl Into<BigInt>) -> Self {
        let data = Arc::make_mut(&mut self.0);
        data.reset = wrap(&reset.into(), data.shape.width, data.shape.signed);
        self
    }

    /// Excludes this signal from its clock domain's reset logic.
    pub fn reset_less(mut self) -> Self {
        Arc::make_mut(&mut self.0).reset_less = true;
        self
    }

    /// Returns the unique ID of this signal.
    pub fn id(&self) -> SignalId {
        self.0.id
    }

    /// Returns the user-supplied name hint.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the signal's shape.
    pub fn shape(&self) -> Shape {
        self.0.shape
    }

    /// Returns the signal's width in bits.
    pub fn width(&self) -> u32 {
        self.0.shape.width
    }

    /// Returns `true` if the signal is signed.
    pub fn is_signed(&self) -> bool {
        self.0.shape.signed
    }

    /// Returns the reset (and initial) value.
    pub fn reset(&self) -> &BigInt {
        &self.0.reset
    }

    /// Returns `true` if the signal is excluded from reset logic.
    pub fn is_reset_less(&self) -> bool {
        self.0.reset_less
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Signal {}

impl PartialOrd for Signal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Signal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {})", self.0.name, self.0.shape)
    }
}
