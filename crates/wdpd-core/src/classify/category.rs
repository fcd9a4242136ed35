//! Broad category resolution against the taxonomy's leaf buckets.

use crate::models::BroadCategory;
use crate::taxonomy::ActionTaxonomy;

/// Map an action code to the first leaf bucket that lists it, or `NO_CAT`.
///
/// Composite buckets are never returned.
pub fn classify(action: Option<&str>, taxonomy: &ActionTaxonomy) -> BroadCategory {
    action
        .and_then(|a| taxonomy.leaf_of(a))
        .unwrap_or(BroadCategory::NoCat)
}
