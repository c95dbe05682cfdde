//! LedSet Tests
//!
//! Tests for:
//! - Sorted-unique invariant across every public operation
//! - Batched modification guard normalization
//! - Set algebra: union, difference, intersection
//! - adjust_removed boundary behavior

use freyr::LedSet;

fn is_sorted_unique(set: &LedSet) -> bool {
    set.as_slice().windows(2).all(|w| w[0] < w[1])
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn insert_keeps_sorted_unique() {
    let mut set = LedSet::new();
    for i in [5u32, 1, 9, 5, 0, 9, 3] {
        set.insert(i);
        assert!(is_sorted_unique(&set));
    }
    assert_eq!(set.as_slice(), &[0, 1, 3, 5, 9]);
    assert_eq!(set.len(), 5);
}

#[test]
fn modification_guard_defers_one_normalization() {
    let mut set = LedSet::new();
    {
        let mut m = set.modify();
        m.append_range(10, 5);
        m.append_slice(&[3, 12, 3]);
        m.push(11);
    }
    assert!(is_sorted_unique(&set));
    assert_eq!(set.as_slice(), &[3, 10, 11, 12, 13, 14]);
}

#[test]
fn contains_uses_the_full_set() {
    let set = LedSet::from_range(4, 4);
    assert!(set.contains(4));
    assert!(set.contains(7));
    assert!(!set.contains(3));
    assert!(!set.contains(8));
}

// ============================================================================
// Set algebra
// ============================================================================

#[test]
fn union_deduplicates() {
    let mut a = LedSet::from_range(0, 4);
    a.union_with(&LedSet::from_range(2, 4));
    assert_eq!(a.as_slice(), &[0, 1, 2, 3, 4, 5]);
}

#[test]
fn difference_removes_overlap_only() {
    let mut a = LedSet::from_range(0, 8);
    a.subtract(&LedSet::from_slice(&[1, 3, 5, 100]));
    assert_eq!(a.as_slice(), &[0, 2, 4, 6, 7]);
    assert!(is_sorted_unique(&a));
}

#[test]
fn intersection_keeps_common_elements() {
    let mut a = LedSet::from_slice(&[1, 4, 6, 9]);
    a.intersect(&LedSet::from_slice(&[0, 4, 9, 12]));
    assert_eq!(a.as_slice(), &[4, 9]);
}

#[test]
fn difference_with_empty_is_identity() {
    let mut a = LedSet::from_range(0, 3);
    a.subtract(&LedSet::new());
    assert_eq!(a.as_slice(), &[0, 1, 2]);
}

// ============================================================================
// adjust_removed boundaries
// ============================================================================

#[test]
fn adjust_removed_before_window_is_untouched() {
    let mut set = LedSet::from_range(0, 5);
    set.adjust_removed(10, 5);
    assert_eq!(set.as_slice(), &[0, 1, 2, 3, 4]);
}

#[test]
fn adjust_removed_inside_window_empties() {
    let mut set = LedSet::from_range(10, 5);
    set.adjust_removed(10, 5);
    assert!(set.is_empty());
}

#[test]
fn adjust_removed_straddling_keeps_outside_pieces() {
    let mut set = LedSet::from_range(0, 20);
    set.adjust_removed(5, 10);
    // 0..5 untouched, 5..15 dropped, 15..20 shifted down by 10
    assert_eq!(set.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert!(is_sorted_unique(&set));
}

#[test]
fn adjust_removed_after_window_shifts_down() {
    let mut set = LedSet::from_slice(&[12, 15, 19]);
    set.adjust_removed(0, 10);
    assert_eq!(set.as_slice(), &[2, 5, 9]);
}
