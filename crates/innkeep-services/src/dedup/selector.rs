//! Canonical selector: picks the surviving asset of a duplicate group.

use innkeep_core::models::{CanonicalChoice, DuplicateGroup};

/// Choose the canonical member of `group`.
///
/// Members are ordered by `(created_at, id)`. The oldest protected member is
/// canonical when one exists, otherwise the oldest member. Other protected
/// members are retained and never slated for deletion. Returns `None` for an
/// empty group.
pub fn select_canonical(group: &DuplicateGroup) -> Option<CanonicalChoice> {
    let mut members = group.members.clone();
    if members.is_empty() {
        return None;
    }
    members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let canonical_idx = members.iter().position(|a| a.is_protected).unwrap_or(0);
    let canonical = members.remove(canonical_idx);
    let (retained, to_delete): (Vec<_>, Vec<_>) =
        members.into_iter().partition(|a| a.is_protected);

    Some(CanonicalChoice {
        canonical,
        to_delete,
        retained,
    })
}
