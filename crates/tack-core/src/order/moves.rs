//! Single-item moves.
//!
//! A same-container move removes the item and re-inserts it, so only the
//! items strictly between the old and new slot shift by one. A move across
//! containers opens a slot in the target (items at `>= to` shift up) and
//! closes the gap in the source (items at `> from` shift down).

use std::fmt;

use serde::Serialize;

use super::{OrderError, OrderedContainer, OutOfRangePolicy};

/// Where a moved item came from and where it landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveEffect {
    pub from: usize,
    pub to: usize,
    /// The item already sat on the requested slot; nothing changed.
    pub noop: bool,
}

impl<I> OrderedContainer<I>
where
    I: Clone + Ord + fmt::Display,
{
    /// Move `item` to `requested` inside this container.
    ///
    /// Valid targets are `0..=len-1` (the count once the item is lifted out).
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::UnknownItem`] if the item is not here and
    /// [`OrderError::PositionOutOfRange`] when the target is rejected by
    /// `policy`.
    pub fn move_within(
        &mut self,
        item: &I,
        requested: i64,
        policy: OutOfRangePolicy,
    ) -> Result<MoveEffect, OrderError> {
        let from = self.require(item)?;
        let to = policy.resolve(requested, self.len() - 1)?;
        if from == to {
            return Ok(MoveEffect {
                from,
                to,
                noop: true,
            });
        }

        let moved = self.items.remove(from);
        self.items.insert(to, moved);
        Ok(MoveEffect {
            from,
            to,
            noop: false,
        })
    }
}

/// Move `item` from `source` into `target` at `requested`.
///
/// Valid targets are `0..=target.len()`; `target.len()` appends. Both
/// containers are left untouched on error.
///
/// # Errors
///
/// - [`OrderError::UnknownItem`] if `source` does not hold the item
/// - [`OrderError::DuplicateItem`] if `target` already holds it
/// - [`OrderError::PositionOutOfRange`] when rejected by `policy`
pub fn move_between<I>(
    source: &mut OrderedContainer<I>,
    target: &mut OrderedContainer<I>,
    item: &I,
    requested: i64,
    policy: OutOfRangePolicy,
) -> Result<MoveEffect, OrderError>
where
    I: Clone + Ord + fmt::Display,
{
    let from = source.require(item)?;
    if target.contains(item) {
        return Err(OrderError::DuplicateItem {
            item: item.to_string(),
        });
    }
    let to = policy.resolve(requested, target.len())?;

    let moved = source.items.remove(from);
    target.items.insert(to, moved);
    Ok(MoveEffect {
        from,
        to,
        noop: false,
    })
}
