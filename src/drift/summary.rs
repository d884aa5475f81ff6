//! Drift summaries.

use serde::{Deserialize, Serialize};

use crate::plan::{ChangeCategory, ResourceChange};

/// Aggregate counts over a set of resource changes.
///
/// A replaced resource counts once as created and once as deleted, so the
/// counters may add up to more than the number of changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSummary {
    /// Resources to create.
    pub created: usize,
    /// Resources to update in place.
    pub updated: usize,
    /// Resources to destroy.
    pub deleted: usize,
    /// Resources without pending changes.
    pub unchanged: usize,
    /// Share of unchanged resources, 0 to 100.
    pub alignment_percentage: u8,
}

impl Default for DriftSummary {
    fn default() -> Self {
        Self::from_counts(0, 0, 0, 0)
    }
}

impl DriftSummary {
    /// Summarizes a set of changes.
    pub fn from_changes<'a, I>(changes: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceChange>,
    {
        let (mut created, mut updated, mut deleted, mut unchanged) = (0, 0, 0, 0);

        for change in changes {
            match change.category() {
                ChangeCategory::Create => created += 1,
                ChangeCategory::Update => updated += 1,
                ChangeCategory::Delete => deleted += 1,
                ChangeCategory::Replace => {
                    created += 1;
                    deleted += 1;
                }
                ChangeCategory::Read | ChangeCategory::NoOp => unchanged += 1,
            }
        }

        Self::from_counts(created, updated, deleted, unchanged)
    }

    /// Builds a summary from raw counts.
    #[must_use]
    pub fn from_counts(created: usize, updated: usize, deleted: usize, unchanged: usize) -> Self {
        let total = created + updated + deleted + unchanged;
        Self {
            created,
            updated,
            deleted,
            unchanged,
            alignment_percentage: percentage(unchanged, total, 100),
        }
    }

    /// Sum of all counters.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.unchanged
    }

    /// Returns true if anything is pending.
    #[must_use]
    pub const fn has_drift(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

/// `round(part / whole * 100)` with halves rounded up, or `empty` when
/// `whole` is zero.
#[must_use]
pub fn percentage(part: usize, whole: usize, empty: u8) -> u8 {
    if whole == 0 {
        return empty;
    }
    let rounded = (part.min(whole) * 200 + whole) / (whole * 2);
    u8::try_from(rounded).unwrap_or(100)
}
