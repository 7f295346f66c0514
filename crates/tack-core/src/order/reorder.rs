//! Bulk re-assignment of positions from an explicit mapping.
//!
//! Items named in the mapping land exactly on their requested slot. Every
//! other item keeps its relative order and fills the slots nobody claimed,
//! lowest first. Applying the same mapping to its own output yields the
//! same output, so a retried reorder is harmless.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{OrderError, OrderedContainer};

/// What to do with mapping entries for items the container does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownItemPolicy {
    /// Ignore the entry and report it in [`ReorderPlan::skipped`].
    #[default]
    Skip,
    /// Fail the whole batch with [`OrderError::UnknownItem`].
    Reject,
}

/// Result of [`OrderedContainer::reorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan<I> {
    /// The container after the reorder.
    pub result: OrderedContainer<I>,
    /// Mapping entries ignored because the item is not in the container.
    pub skipped: Vec<I>,
}

impl<I> OrderedContainer<I>
where
    I: Clone + Ord + fmt::Display,
{
    /// Compute the container order after applying `mapping`.
    ///
    /// # Errors
    ///
    /// - [`OrderError::PositionOutOfRange`] if a requested position is not
    ///   in `0..len`
    /// - [`OrderError::PositionClaimedTwice`] if two items request one slot
    /// - [`OrderError::UnknownItem`] for a foreign item under
    ///   [`UnknownItemPolicy::Reject`]
    pub fn reorder(
        &self,
        mapping: &BTreeMap<I, i64>,
        policy: UnknownItemPolicy,
    ) -> Result<ReorderPlan<I>, OrderError> {
        let len = self.len();
        let mut slots: Vec<Option<I>> = vec![None; len];
        let mut skipped = Vec::new();

        for (item, &requested) in mapping {
            if !self.contains(item) {
                match policy {
                    UnknownItemPolicy::Skip => {
                        skipped.push(item.clone());
                        continue;
                    }
                    UnknownItemPolicy::Reject => {
                        return Err(OrderError::UnknownItem {
                            item: item.to_string(),
                        });
                    }
                }
            }

            let slot = usize::try_from(requested)
                .ok()
                .filter(|slot| *slot < len)
                .ok_or(OrderError::PositionOutOfRange {
                    requested,
                    max: len.saturating_sub(1),
                })?;

            if slots[slot].is_some() {
                return Err(OrderError::PositionClaimedTwice { position: slot });
            }
            slots[slot] = Some(item.clone());
        }

        let mut unclaimed = self
            .items()
            .iter()
            .filter(|item| !mapping.contains_key(*item));

        // One unclaimed item exists per empty slot.
        let items: Vec<I> = slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| unclaimed.next().cloned()))
            .collect();
        debug_assert_eq!(items.len(), len);

        Ok(ReorderPlan {
            result: Self::new(items)?,
            skipped,
        })
    }
}
