//! Three-valued boolean for inheritable flags.

use serde::{Deserialize, Serialize};

/// A flag that is either explicitly set or inherits from a template/default.
///
/// Precedence when resolving: own value, then the template's, then the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum OptionalBool {
    #[default]
    Unset,
    Set(bool),
}

impl OptionalBool {
    pub fn is_unset(&self) -> bool {
        matches!(self, OptionalBool::Unset)
    }

    /// Keep an explicit value, otherwise take `fallback`.
    pub fn or(self, fallback: OptionalBool) -> OptionalBool {
        match self {
            OptionalBool::Set(_) => self,
            OptionalBool::Unset => fallback,
        }
    }

    /// Collapse to a plain bool, using `default` when unset.
    pub fn resolve(self, default: bool) -> bool {
        match self {
            OptionalBool::Set(v) => v,
            OptionalBool::Unset => default,
        }
    }
}

impl From<Option<bool>> for OptionalBool {
    fn from(value: Option<bool>) -> Self {
        value.map_or(OptionalBool::Unset, OptionalBool::Set)
    }
}

impl From<OptionalBool> for Option<bool> {
    fn from(value: OptionalBool) -> Self {
        match value {
            OptionalBool::Set(v) => Some(v),
            OptionalBool::Unset => None,
        }
    }
}

impl From<bool> for OptionalBool {
    fn from(value: bool) -> Self {
        OptionalBool::Set(value)
    }
}
