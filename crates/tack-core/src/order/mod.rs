//! Dense, zero-based ordering for the items of a single container.
//!
//! An [`OrderedContainer`] is a snapshot of one container's items in
//! position order: the item at index `i` has position `i`. Because the
//! position is the index, every container built here satisfies the
//! density invariant by construction (positions are exactly `0..len`).
//!
//! All operations are pure and synchronous. They never touch storage;
//! [`crate::store`] loads a snapshot, calls into this module to compute
//! the next snapshot, and writes back only the rows whose position
//! changed (see [`OrderedContainer::position_changes`]).
//!
//! - [`reorder`]: bulk re-assignment from an explicit `item -> position` map
//! - [`moves`]: single-item moves inside one container or between two

pub mod moves;
pub mod reorder;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use moves::{MoveEffect, move_between};
pub use reorder::{ReorderPlan, UnknownItemPolicy};

/// Validation failures raised by the ordering logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("item {item} is not in this container")]
    UnknownItem { item: String },

    #[error("item {item} is already in this container")]
    DuplicateItem { item: String },

    #[error("position {requested} is out of range (allowed 0..={max})")]
    PositionOutOfRange { requested: i64, max: usize },

    #[error("position {position} is claimed by more than one item")]
    PositionClaimedTwice { position: usize },
}

/// How a requested slot outside the allowed range is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Fail with [`OrderError::PositionOutOfRange`].
    #[default]
    Reject,
    /// Pin the request to the nearest valid slot.
    Clamp,
}

impl OutOfRangePolicy {
    /// Resolve `requested` against the inclusive range `0..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::PositionOutOfRange`] under [`Self::Reject`]
    /// when `requested` is negative or greater than `max`.
    pub fn resolve(self, requested: i64, max: usize) -> Result<usize, OrderError> {
        match usize::try_from(requested) {
            Ok(slot) if slot <= max => Ok(slot),
            _ => match self {
                Self::Reject => Err(OrderError::PositionOutOfRange { requested, max }),
                Self::Clamp if requested < 0 => Ok(0),
                Self::Clamp => Ok(max),
            },
        }
    }
}

/// One container's items, index == position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedContainer<I> {
    items: Vec<I>,
}

impl<I> Default for OrderedContainer<I> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<I> OrderedContainer<I>
where
    I: Clone + Ord + fmt::Display,
{
    /// Build a container from items already in display order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::DuplicateItem`] if an item appears twice.
    pub fn new(items: Vec<I>) -> Result<Self, OrderError> {
        let mut seen = std::collections::BTreeSet::new();
        for item in &items {
            if !seen.insert(item) {
                return Err(OrderError::DuplicateItem {
                    item: item.to_string(),
                });
            }
        }
        Ok(Self { items })
    }

    /// Build a container from stored `(item, position)` rows.
    ///
    /// Rows are sorted by stored position with the item id as tie-break, so
    /// a damaged container (gaps or duplicate positions) still yields a
    /// deterministic dense order.
    #[must_use]
    pub fn from_positions(rows: impl IntoIterator<Item = (I, i64)>) -> Self {
        let mut rows: Vec<(I, i64)> = rows.into_iter().collect();
        rows.sort_by(|(a_id, a_pos), (b_id, b_pos)| a_pos.cmp(b_pos).then_with(|| a_id.cmp(b_id)));
        Self {
            items: rows.into_iter().map(|(item, _)| item).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in position order.
    #[must_use]
    pub fn items(&self) -> &[I] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, item: &I) -> bool {
        self.items.contains(item)
    }

    /// Current position of `item`, if present.
    #[must_use]
    pub fn position_of(&self, item: &I) -> Option<usize> {
        self.items.iter().position(|candidate| candidate == item)
    }

    /// `(item, position)` pairs in position order.
    pub fn assignments(&self) -> impl Iterator<Item = (&I, usize)> {
        self.items.iter().enumerate().map(|(pos, item)| (item, pos))
    }

    /// Append at the end and return the assigned position.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::DuplicateItem`] if the item is already present.
    pub fn append(&mut self, item: I) -> Result<usize, OrderError> {
        let slot = self.items.len();
        self.insert(item, slot)
    }

    /// Insert at `slot`, shifting every item at `>= slot` down by one.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::DuplicateItem`] if the item is already present
    /// and [`OrderError::PositionOutOfRange`] if `slot > len`.
    pub fn insert(&mut self, item: I, slot: usize) -> Result<usize, OrderError> {
        if self.contains(&item) {
            return Err(OrderError::DuplicateItem {
                item: item.to_string(),
            });
        }
        if slot > self.items.len() {
            return Err(OrderError::PositionOutOfRange {
                requested: i64::try_from(slot).unwrap_or(i64::MAX),
                max: self.items.len(),
            });
        }
        self.items.insert(slot, item);
        Ok(slot)
    }

    /// Remove `item`, closing the gap. Returns its former position.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::UnknownItem`] if the item is not present.
    pub fn remove(&mut self, item: &I) -> Result<usize, OrderError> {
        let slot = self.require(item)?;
        self.items.remove(slot);
        Ok(slot)
    }

    /// Rows of `self` whose position differs from `before`, including
    /// items that `before` did not hold at all.
    #[must_use]
    pub fn position_changes(&self, before: &Self) -> Vec<(I, usize)> {
        let previous: BTreeMap<&I, usize> = before.assignments().collect();
        self.assignments()
            .filter(|(item, pos)| previous.get(item) != Some(pos))
            .map(|(item, pos)| (item.clone(), pos))
            .collect()
    }

    fn require(&self, item: &I) -> Result<usize, OrderError> {
        self.position_of(item)
            .ok_or_else(|| OrderError::UnknownItem {
                item: item.to_string(),
            })
    }
}

/// True when `positions` is exactly `{0, .., n-1}`.
#[must_use]
pub fn is_dense(positions: impl IntoIterator<Item = i64>) -> bool {
    let mut positions: Vec<i64> = positions.into_iter().collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(idx, pos)| i64::try_from(idx).is_ok_and(|expected| expected == *pos))
}

#[cfg(test)]
mod tests {
    use super::{OrderError, OrderedContainer, OutOfRangePolicy, is_dense};

    fn container(items: &[&str]) -> OrderedContainer<String> {
        OrderedContainer::new(items.iter().map(ToString::to_string).collect())
            .expect("unique items")
    }

    #[test]
    fn from_positions_sorts_and_densifies() {
        let c = OrderedContainer::from_positions(vec![
            ("c".to_string(), 7),
            ("a".to_string(), 2),
            ("b".to_string(), 2),
        ]);
        assert_eq!(c.items(), ["a", "b", "c"]);
        assert_eq!(c.position_of(&"c".to_string()), Some(2));
    }

    #[test]
    fn new_rejects_duplicates() {
        let err = OrderedContainer::new(vec!["a".to_string(), "a".to_string()]).unwrap_err();
        assert_eq!(err, OrderError::DuplicateItem { item: "a".into() });
    }

    #[test]
    fn append_on_empty_starts_at_zero() {
        let mut c = OrderedContainer::<String>::default();
        assert_eq!(c.append("a".into()), Ok(0));
        assert_eq!(c.append("b".into()), Ok(1));
        assert!(c.append("a".into()).is_err());
    }

    #[test]
    fn insert_shifts_following_items() {
        let mut c = container(&["a", "b", "c"]);
        c.insert("x".into(), 1).expect("insert");
        assert_eq!(c.items(), ["a", "x", "b", "c"]);

        let err = c.insert("y".into(), 9).unwrap_err();
        assert_eq!(
            err,
            OrderError::PositionOutOfRange {
                requested: 9,
                max: 4
            }
        );
    }

    #[test]
    fn remove_closes_gap() {
        let mut c = container(&["a", "b", "c"]);
        assert_eq!(c.remove(&"a".to_string()), Ok(0));
        assert_eq!(c.items(), ["b", "c"]);
        assert!(matches!(
            c.remove(&"zzz".to_string()),
            Err(OrderError::UnknownItem { .. })
        ));
    }

    #[test]
    fn position_changes_lists_only_moved_rows() {
        let before = container(&["a", "b", "c", "d"]);
        let after = container(&["a", "c", "b", "d"]);
        assert_eq!(
            after.position_changes(&before),
            vec![("c".to_string(), 1), ("b".to_string(), 2)]
        );

        let grown = container(&["a", "b", "c", "d", "e"]);
        assert_eq!(grown.position_changes(&before), vec![("e".to_string(), 4)]);
    }

    #[test]
    fn out_of_range_policy() {
        assert_eq!(OutOfRangePolicy::Reject.resolve(2, 3), Ok(2));
        assert_eq!(OutOfRangePolicy::Reject.resolve(3, 3), Ok(3));
        assert!(OutOfRangePolicy::Reject.resolve(4, 3).is_err());
        assert!(OutOfRangePolicy::Reject.resolve(-1, 3).is_err());
        assert_eq!(OutOfRangePolicy::Clamp.resolve(40, 3), Ok(3));
        assert_eq!(OutOfRangePolicy::Clamp.resolve(-5, 3), Ok(0));
    }

    #[test]
    fn density_check() {
        assert!(is_dense([]));
        assert!(is_dense([2, 0, 1]));
        assert!(!is_dense([0, 2]));
        assert!(!is_dense([0, 0, 1]));
        assert!(!is_dense([1, 2]));
    }
}
