//! Hash index builder: groups byte-identical assets.

use std::collections::{BTreeMap, BTreeSet};

use innkeep_core::models::{DuplicateGroup, MediaAsset};

/// Group `assets` by (content hash, byte size) and keep groups with two or more members.
///
/// `assets` must be the unfiltered library; a category filter applied first would
/// hide cross-category duplicates. Assets without a hash are ignored. Groups come
/// back ordered by hash, members ordered by `(created_at, id)`.
pub fn build_hash_index(assets: &[MediaAsset]) -> Vec<DuplicateGroup> {
    let mut by_key: BTreeMap<(String, i64), Vec<&MediaAsset>> = BTreeMap::new();
    let mut sizes_by_hash: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
    let mut unhashed = 0usize;

    for asset in assets {
        let Some(hash) = asset.grouping_hash() else {
            unhashed += 1;
            continue;
        };
        sizes_by_hash.entry(hash.clone()).or_default().insert(asset.byte_size);
        by_key.entry((hash, asset.byte_size)).or_default().push(asset);
    }

    for (hash, sizes) in &sizes_by_hash {
        if sizes.len() > 1 {
            tracing::warn!(
                hash = %hash,
                sizes = ?sizes,
                "Assets share a content hash but differ in size; not merging across sizes"
            );
        }
    }

    if unhashed > 0 {
        tracing::debug!(unhashed, "Skipped assets without a content hash");
    }

    by_key
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|((hash, byte_size), members)| {
            let mut members: Vec<MediaAsset> = members.into_iter().cloned().collect();
            members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            DuplicateGroup {
                hash,
                byte_size,
                members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::test_support::{asset, day};

    #[test]
    fn groups_equal_hash_and_size() {
        let assets = vec![
            asset("/c.jpg", "h1", 100, day(3, 1)),
            asset("/a.jpg", "h1", 100, day(1, 1)),
            asset("/b.jpg", "h1", 100, day(2, 1)),
            asset("/solo.jpg", "h2", 100, day(1, 1)),
        ];
        let groups = build_hash_index(&assets);
        assert_eq!(groups.len(), 1);
        let urls: Vec<_> = groups[0].members.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["/a.jpg", "/b.jpg", "/c.jpg"]);
        assert_eq!(groups[0].key(), "h1:100");
    }

    #[test]
    fn different_sizes_are_not_merged() {
        let assets = vec![
            asset("/a.jpg", "h1", 100, day(1, 1)),
            asset("/b.jpg", "h1", 101, day(2, 1)),
        ];
        assert!(build_hash_index(&assets).is_empty());
    }

    #[test]
    fn unhashed_assets_are_ignored() {
        let mut a = asset("/a.jpg", "", 100, day(1, 1));
        let mut b = asset("/b.jpg", "", 100, day(2, 1));
        a.content_hash = None;
        b.content_hash = Some("   ".to_string());
        assert!(build_hash_index(&[a, b]).is_empty());
    }

    #[test]
    fn hash_case_does_not_split_groups() {
        let assets = vec![
            asset("/a.jpg", "ABC123", 100, day(1, 1)),
            asset("/b.jpg", "abc123", 100, day(2, 1)),
        ];
        let groups = build_hash_index(&assets);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].hash, "abc123");
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn groups_sorted_by_hash() {
        let assets = vec![
            asset("/z1.jpg", "zz", 1, day(1, 1)),
            asset("/z2.jpg", "zz", 1, day(1, 2)),
            asset("/a1.jpg", "aa", 1, day(1, 1)),
            asset("/a2.jpg", "aa", 1, day(1, 2)),
        ];
        let hashes: Vec<_> = build_hash_index(&assets)
            .into_iter()
            .map(|g| g.hash)
            .collect();
        assert_eq!(hashes, vec!["aa", "zz"]);
    }
}
