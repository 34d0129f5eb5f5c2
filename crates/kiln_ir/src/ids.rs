//! Opaque ID newtypes for IR entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Ord`, `Hash`, and
//! `Serialize`/`Deserialize`. Fresh IDs come from a per-type atomic counter, so
//! two entities never share an ID within one process and later entities
//! always compare greater. Emission order is derived from this ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident, $prefix:literal) => {
        static $counter: AtomicU32 = AtomicU32::new(0);

        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Allocates a new, never-before-seen ID.
            pub fn fresh() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a signal.
    SignalId,
    NEXT_SIGNAL_ID,
    "s"
);

define_id!(
    /// Opaque, copyable ID for a special.
    SpecialId,
    NEXT_SPECIAL_ID,
    "sp"
);
