//! Resource listing filters.

use serde::{Deserialize, Serialize};

use super::classify::ChangeCategory;
use super::types::ResourceChange;

/// Filter applied to a resource listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFilter {
    /// Every resource.
    #[default]
    All,
    /// Only resources with pending changes.
    Diff,
    /// Created or replaced resources.
    Create,
    /// Updated resources.
    Update,
    /// Deleted or replaced resources.
    Delete,
}

impl ChangeFilter {
    /// Returns true if a resource shown with `category` passes the filter.
    #[must_use]
    pub const fn matches(self, category: ChangeCategory) -> bool {
        use ChangeCategory as C;

        match self {
            Self::All => true,
            Self::Diff => category.is_change(),
            Self::Create => matches!(category, C::Create | C::Replace),
            Self::Update => matches!(category, C::Update),
            Self::Delete => matches!(category, C::Delete | C::Replace),
        }
    }

    /// Returns the changes that pass the filter, in input order.
    #[must_use]
    pub fn apply<'a>(self, changes: &'a [ResourceChange]) -> Vec<&'a ResourceChange> {
        changes
            .iter()
            .filter(|c| self.matches(ChangeCategory::display_category(&c.change.actions)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes() -> Vec<ResourceChange> {
        vec![
            ResourceChange::new("a", &["create"]),
            ResourceChange::new("b", &["update"]),
            ResourceChange::new("c", &["delete"]),
            ResourceChange::new("d", &["delete", "create"]),
            ResourceChange::new("e", &["read"]),
            ResourceChange::new("f", &["no-op"]),
        ]
    }

    fn addresses(filter: ChangeFilter) -> Vec<String> {
        filter
            .apply(&changes())
            .into_iter()
            .map(|c| c.address.clone())
            .collect()
    }

    #[test]
    fn test_filters() {
        assert_eq!(addresses(ChangeFilter::All).len(), 6);
        assert_eq!(addresses(ChangeFilter::Diff), ["a", "b", "c", "d"]);
        assert_eq!(addresses(ChangeFilter::Create), ["a", "d"]);
        assert_eq!(addresses(ChangeFilter::Update), ["b"]);
        assert_eq!(addresses(ChangeFilter::Delete), ["c", "d"]);
    }
}
