//! Sorted-list primitives
//!
//! Binary-search helpers that keep a `Vec` ordered on insert without
//! re-sorting, plus span lookups over lists of non-overlapping time ranges.
//! The series range cache stores its segments through these.

use crate::telem::TimeRange;
use std::cmp::Ordering;
use std::ops::Range;

/// Index at which `key` would be inserted to keep `items` sorted.
///
/// Equal keys are skipped, so a new item lands after existing items with
/// the same key (stable insertion order).
pub fn insertion_index<T, K, F>(items: &[T], key: &K, key_of: F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.partition_point(|item| key_of(item).cmp(key) != Ordering::Greater)
}

/// Insert `value` at its sorted position and return that position.
///
/// O(log n) search, O(n) splice.
pub fn insert_sorted<T, K, F>(items: &mut Vec<T>, value: T, key_of: F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let idx = insertion_index(items, &key_of(&value), &key_of);
    items.insert(idx, value);
    idx
}

/// Index of the first item whose key is not less than `key`.
pub fn lower_bound<T, K, F>(items: &[T], key: &K, key_of: F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.partition_point(|item| key_of(item) < *key)
}

/// Contiguous run of items whose ranges are adjacent to or overlap `range`.
///
/// `items` must be sorted by start and pairwise non-overlapping, which makes
/// their ends sorted too.
pub fn touching<T, F>(items: &[T], range: &TimeRange, range_of: F) -> Range<usize>
where
    F: Fn(&T) -> TimeRange,
{
    let first = items.partition_point(|item| range_of(item).end < range.start);
    let last = items.partition_point(|item| range_of(item).start <= range.end);
    first..last.max(first)
}

/// Contiguous run of items whose ranges strictly overlap `range`.
///
/// Same ordering requirement as [`touching`].
pub fn overlapping<T, F>(items: &[T], range: &TimeRange, range_of: F) -> Range<usize>
where
    F: Fn(&T) -> TimeRange,
{
    let first = items.partition_point(|item| range_of(item).end <= range.start);
    let last = items.partition_point(|item| range_of(item).start < range.end);
    first..last.max(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ranges(bounds: &[(i64, i64)]) -> Vec<TimeRange> {
        bounds.iter().map(|&(s, e)| TimeRange::seconds(s, e)).collect()
    }

    #[test]
    fn test_insert_sorted_keeps_order() {
        let mut items = vec![1, 4, 9];
        assert_eq!(insert_sorted(&mut items, 5, |v| *v), 2);
        assert_eq!(insert_sorted(&mut items, 0, |v| *v), 0);
        assert_eq!(insert_sorted(&mut items, 10, |v| *v), 5);
        assert_eq!(items, vec![0, 1, 4, 5, 9, 10]);
    }

    #[test]
    fn test_insert_sorted_equal_keys_are_stable() {
        let mut items = vec![(1, 'a'), (2, 'b')];
        insert_sorted(&mut items, (1, 'c'), |v| v.0);
        assert_eq!(items, vec![(1, 'a'), (1, 'c'), (2, 'b')]);
    }

    #[test]
    fn test_insert_sorted_random() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut items = Vec::new();
        for _ in 0..500 {
            insert_sorted(&mut items, rng.gen_range(-1000..1000), |v: &i32| *v);
        }
        assert!(items.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_lower_bound() {
        let items = vec![1, 3, 3, 7];
        assert_eq!(lower_bound(&items, &3, |v| *v), 1);
        assert_eq!(lower_bound(&items, &4, |v| *v), 3);
        assert_eq!(lower_bound(&items, &8, |v| *v), 4);
    }

    #[test]
    fn test_touching_includes_adjacent() {
        let items = ranges(&[(0, 2), (4, 6), (8, 10)]);
        assert_eq!(touching(&items, &TimeRange::seconds(2, 4), |r| *r), 0..2);
        assert_eq!(touching(&items, &TimeRange::seconds(11, 12), |r| *r), 3..3);
        assert_eq!(touching(&items, &TimeRange::seconds(6, 8), |r| *r), 1..3);
        assert_eq!(touching(&items, &TimeRange::seconds(3, 3), |r| *r), 1..1);
    }

    #[test]
    fn test_overlapping_excludes_adjacent() {
        let items = ranges(&[(0, 2), (4, 6), (8, 10)]);
        assert_eq!(overlapping(&items, &TimeRange::seconds(2, 4), |r| *r), 1..1);
        assert_eq!(overlapping(&items, &TimeRange::seconds(1, 9), |r| *r), 0..3);
        assert_eq!(overlapping(&items, &TimeRange::seconds(5, 7), |r| *r), 1..2);
    }
}
