//! Change classification.
//!
//! Maps a resource's raw action list to a single [`ChangeCategory`].
//! Classification is total: empty or unrecognized action lists are `NoOp`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete category of a planned resource change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    /// The resource will be created.
    Create,
    /// The resource will be updated in place.
    Update,
    /// The resource will be destroyed.
    Delete,
    /// The resource will be destroyed and recreated.
    Replace,
    /// The resource is only read (data source).
    Read,
    /// No change.
    #[serde(rename = "no-op")]
    NoOp,
}

/// Classifies an action list.
///
/// Precedence, first match wins: `create` with `delete` is `Replace`, then
/// `create`, `delete`, `update`. Anything else is `NoOp`.
pub fn classify<I, S>(actions: I) -> ChangeCategory
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (mut create, mut delete, mut update) = (false, false, false);

    for action in actions {
        match action.as_ref() {
            "create" => create = true,
            "delete" => delete = true,
            "update" => update = true,
            _ => {}
        }
    }

    match (create, delete, update) {
        (true, true, _) => ChangeCategory::Replace,
        (true, false, _) => ChangeCategory::Create,
        (false, true, _) => ChangeCategory::Delete,
        (false, false, true) => ChangeCategory::Update,
        (false, false, false) => ChangeCategory::NoOp,
    }
}

impl ChangeCategory {
    /// All categories in display order.
    pub const ALL: [Self; 6] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Replace,
        Self::Read,
        Self::NoOp,
    ];

    /// Category shown for a single resource in a listing.
    ///
    /// Same as [`classify`], except that an action list of exactly `["read"]`
    /// is shown as `Read`.
    pub fn display_category<S: AsRef<str>>(actions: &[S]) -> Self {
        match actions {
            [only] if only.as_ref() == "read" => Self::Read,
            _ => classify(actions),
        }
    }

    /// Returns true if the category represents pending infrastructure work.
    #[must_use]
    pub const fn is_change(self) -> bool {
        !matches!(self, Self::NoOp | Self::Read)
    }

    /// Returns the lowercase label of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::Read => "read",
            Self::NoOp => "no-op",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_actions() {
        assert_eq!(classify(["create"]), ChangeCategory::Create);
        assert_eq!(classify(["delete"]), ChangeCategory::Delete);
        assert_eq!(classify(["update"]), ChangeCategory::Update);
        assert_eq!(classify(["read"]), ChangeCategory::NoOp);
        assert_eq!(classify(["no-op"]), ChangeCategory::NoOp);
    }

    #[test]
    fn test_replace_wins_over_everything() {
        assert_eq!(classify(["create", "delete"]), ChangeCategory::Replace);
        assert_eq!(classify(["delete", "create"]), ChangeCategory::Replace);
        assert_eq!(classify(["update", "delete", "read", "create"]), ChangeCategory::Replace);
    }

    #[test]
    fn test_create_and_delete_beat_update() {
        assert_eq!(classify(["update", "create"]), ChangeCategory::Create);
        assert_eq!(classify(["update", "delete"]), ChangeCategory::Delete);
    }

    #[test]
    fn test_empty_and_unknown_are_noop() {
        assert_eq!(classify(Vec::<String>::new()), ChangeCategory::NoOp);
        assert_eq!(classify(["forget", "taint"]), ChangeCategory::NoOp);
        assert_eq!(classify(["CREATE"]), ChangeCategory::NoOp);
    }

    #[test]
    fn test_display_category() {
        assert_eq!(ChangeCategory::display_category(&["read"]), ChangeCategory::Read);
        assert_eq!(ChangeCategory::display_category(&["read", "no-op"]), ChangeCategory::NoOp);
        assert_eq!(
            ChangeCategory::display_category(&["delete", "create"]),
            ChangeCategory::Replace
        );
        assert!(!ChangeCategory::Read.is_change());
        assert!(ChangeCategory::Replace.is_change());
    }
}
