//! Design locations that diagnostics point at.
//!
//! Designs are built from host-language calls rather than parsed from files,
//! so a diagnostic locates its subject by module path and item name instead
//! of a source span.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the design hierarchy a diagnostic was raised.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// Module names from the top of the hierarchy down, e.g. `["top", "x"]`.
    pub path: Vec<String>,
    /// The signal, state, domain or special the diagnostic is about.
    pub item: Option<String>,
}

impl Origin {
    /// An origin with no location information.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// An origin naming a module path.
    pub fn module<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            item: None,
        }
    }

    /// Attaches an item name to this origin.
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// Returns `true` if neither a path nor an item is known.
    pub fn is_unknown(&self) -> bool {
        self.path.is_empty() && self.item.is_none()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<top>")?;
        } else {
            write!(f, "{}", self.path.join("."))?;
        }
        if let Some(item) = &self.item {
            write!(f, " `{item}`")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_and_item() {
        let o = Origin::module(["top", "x"]).with_item("counter");
        assert_eq!(o.to_string(), "top.x `counter`");
    }

    #[test]
    fn display_item_only() {
        let o = Origin::unknown().with_item("sys");
        assert_eq!(o.to_string(), "<top> `sys`");
    }

    #[test]
    fn unknown_origin() {
        assert!(Origin::unknown().is_unknown());
        assert!(!Origin::module(["top"]).is_unknown());
    }
}
