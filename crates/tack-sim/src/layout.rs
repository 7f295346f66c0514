//! Stored layouts and the reference model they are checked against.
//!
//! [`Layout`] is what the store holds: raw positions and version stamps.
//! [`Model`] is what the store should hold, maintained with the pure
//! [`tack_core::order`] operations and never touching SQLite.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tack_core::Service;
use tack_core::authz::Authorizer;
use tack_core::db::query;
use tack_core::model::{BoardId, CardId, ListId};
use tack_core::order::{
    OrderError, OrderedContainer, OutOfRangePolicy, UnknownItemPolicy, move_between,
};

/// Positions and versions as read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// Each board's lists as `(list, position)`, in stored order.
    pub lists: BTreeMap<BoardId, Vec<(ListId, i64)>>,
    /// Each list's cards as `(card, position)`, in stored order.
    pub cards: BTreeMap<ListId, Vec<(CardId, i64)>>,
    /// `lists_version` per board and `cards_version` per list.
    pub versions: BTreeMap<String, i64>,
}

impl Layout {
    /// Read every list and card under `boards`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn load<A: Authorizer>(svc: &Service<A>, boards: &[BoardId]) -> tack_core::Result<Self> {
        let conn = svc.connection();
        let mut layout = Self::default();
        for board in boards {
            let stored = query::require_board(conn, board)?;
            layout
                .versions
                .insert(board.to_string(), stored.lists_version);

            let mut rows = Vec::new();
            for list in query::lists_for_board(conn, board)? {
                let cards = query::cards_for_list(conn, &list.id)?
                    .into_iter()
                    .map(|card| (card.id, card.position))
                    .collect();
                layout.cards.insert(list.id.clone(), cards);
                layout.versions.insert(list.id.to_string(), list.cards_version);
                rows.push((list.id, list.position));
            }
            layout.lists.insert(board.clone(), rows);
        }
        Ok(layout)
    }

    #[must_use]
    pub fn card_count(&self) -> usize {
        self.cards.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    /// Cards currently in `list`, or 0 if it is not in the layout.
    #[must_use]
    pub fn cards_in(&self, list: &ListId) -> usize {
        self.cards.get(list).map_or(0, Vec::len)
    }

    /// Lists currently on `board`.
    #[must_use]
    pub fn lists_on(&self, board: &BoardId) -> usize {
        self.lists.get(board).map_or(0, Vec::len)
    }

    /// Every container with its stored positions, boards first.
    pub fn containers(&self) -> impl Iterator<Item = (String, Vec<i64>)> + '_ {
        let boards = self
            .lists
            .iter()
            .map(|(board, rows)| (board.to_string(), rows.iter().map(|(_, p)| *p).collect()));
        let lists = self
            .cards
            .iter()
            .map(|(list, rows)| (list.to_string(), rows.iter().map(|(_, p)| *p).collect()));
        boards.chain(lists)
    }
}

/// What an operation did to the reference model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Applied {
    /// Rows whose position changed across every touched container.
    pub changed: usize,
    pub noop: bool,
}

/// The expected order of every container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub lists: BTreeMap<BoardId, OrderedContainer<ListId>>,
    pub cards: BTreeMap<ListId, OrderedContainer<CardId>>,
}

impl Model {
    /// Rebuild from a stored layout, trusting its order.
    #[must_use]
    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            lists: layout
                .lists
                .iter()
                .map(|(board, rows)| (board.clone(), OrderedContainer::from_positions(rows.clone())))
                .collect(),
            cards: layout
                .cards
                .iter()
                .map(|(list, rows)| (list.clone(), OrderedContainer::from_positions(rows.clone())))
                .collect(),
        }
    }

    #[must_use]
    pub fn card_count(&self) -> usize {
        self.cards.values().map(OrderedContainer::len).sum()
    }

    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.values().map(OrderedContainer::len).sum()
    }

    #[must_use]
    pub fn list_of(&self, card: &CardId) -> Option<&ListId> {
        self.cards
            .iter()
            .find_map(|(list, cards)| cards.contains(card).then_some(list))
    }

    #[must_use]
    pub fn board_of(&self, list: &ListId) -> Option<&BoardId> {
        self.lists
            .iter()
            .find_map(|(board, lists)| lists.contains(list).then_some(board))
    }

    /// Containers whose stored order differs from the model, as
    /// `(container, expected, observed)`.
    #[must_use]
    pub fn divergences(&self, layout: &Layout) -> Vec<(String, Vec<String>, Vec<String>)> {
        let mut out = Vec::new();
        diverging(&self.lists, &layout.lists, &mut out);
        diverging(&self.cards, &layout.cards, &mut out);
        out
    }

    /// # Errors
    ///
    /// As [`OrderedContainer::move_within`] and [`move_between`].
    pub fn move_card(
        &mut self,
        card: &CardId,
        target: &ListId,
        requested: i64,
        policy: OutOfRangePolicy,
    ) -> Result<Applied, OrderError> {
        let source = self.list_of(card).cloned().ok_or_else(|| unknown(card))?;
        move_item(&mut self.cards, &source, target, card, requested, policy)
    }

    /// # Errors
    ///
    /// As [`Self::move_card`].
    pub fn move_list(
        &mut self,
        list: &ListId,
        target: &BoardId,
        requested: i64,
        policy: OutOfRangePolicy,
    ) -> Result<Applied, OrderError> {
        let source = self.board_of(list).cloned().ok_or_else(|| unknown(list))?;
        move_item(&mut self.lists, &source, target, list, requested, policy)
    }

    /// # Errors
    ///
    /// As [`OrderedContainer::reorder`].
    pub fn reorder_cards(
        &mut self,
        list: &ListId,
        mapping: &BTreeMap<CardId, i64>,
        policy: UnknownItemPolicy,
    ) -> Result<Applied, OrderError> {
        reorder_container(&mut self.cards, list, mapping, policy)
    }

    /// # Errors
    ///
    /// As [`OrderedContainer::reorder`].
    pub fn reorder_lists(
        &mut self,
        board: &BoardId,
        mapping: &BTreeMap<ListId, i64>,
        policy: UnknownItemPolicy,
    ) -> Result<Applied, OrderError> {
        reorder_container(&mut self.lists, board, mapping, policy)
    }

    /// Insert `card` into `list`, appending when `requested` is `None`.
    ///
    /// # Errors
    ///
    /// [`OrderError::PositionOutOfRange`] when `policy` rejects the slot.
    pub fn insert_card(
        &mut self,
        list: &ListId,
        card: CardId,
        requested: Option<i64>,
        policy: OutOfRangePolicy,
    ) -> Result<Applied, OrderError> {
        let container = self.cards.get_mut(list).ok_or_else(|| unknown(list))?;
        let slot = match requested {
            Some(requested) => policy.resolve(requested, container.len())?,
            None => container.len(),
        };
        let before = container.clone();
        container.insert(card, slot)?;
        Ok(Applied {
            changed: container.position_changes(&before).len(),
            noop: false,
        })
    }

    /// # Errors
    ///
    /// [`OrderError::UnknownItem`] if no list holds `card`.
    pub fn remove_card(&mut self, card: &CardId) -> Result<Applied, OrderError> {
        let list = self.list_of(card).cloned().ok_or_else(|| unknown(card))?;
        let container = self.cards.get_mut(&list).ok_or_else(|| unknown(&list))?;
        let before = container.clone();
        container.remove(card)?;
        Ok(Applied {
            changed: container.position_changes(&before).len(),
            noop: false,
        })
    }
}

fn unknown(item: &impl fmt::Display) -> OrderError {
    OrderError::UnknownItem {
        item: item.to_string(),
    }
}

fn move_item<C, I>(
    containers: &mut BTreeMap<C, OrderedContainer<I>>,
    source: &C,
    target: &C,
    item: &I,
    requested: i64,
    policy: OutOfRangePolicy,
) -> Result<Applied, OrderError>
where
    C: Ord + fmt::Display,
    I: Clone + Ord + fmt::Display,
{
    if source == target {
        let container = containers.get_mut(target).ok_or_else(|| unknown(target))?;
        let before = container.clone();
        let effect = container.move_within(item, requested, policy)?;
        return Ok(Applied {
            changed: container.position_changes(&before).len(),
            noop: effect.noop,
        });
    }

    let source_before = containers.get(source).cloned().ok_or_else(|| unknown(source))?;
    let target_before = containers.get(target).cloned().ok_or_else(|| unknown(target))?;
    let mut source_after = source_before.clone();
    let mut target_after = target_before.clone();
    move_between(&mut source_after, &mut target_after, item, requested, policy)?;

    let changed = source_after.position_changes(&source_before).len()
        + target_after.position_changes(&target_before).len();
    if let Some(slot) = containers.get_mut(source) {
        *slot = source_after;
    }
    if let Some(slot) = containers.get_mut(target) {
        *slot = target_after;
    }
    Ok(Applied {
        changed,
        noop: false,
    })
}

fn reorder_container<C, I>(
    containers: &mut BTreeMap<C, OrderedContainer<I>>,
    container: &C,
    mapping: &BTreeMap<I, i64>,
    policy: UnknownItemPolicy,
) -> Result<Applied, OrderError>
where
    C: Ord + fmt::Display,
    I: Clone + Ord + fmt::Display,
{
    let current = containers.get_mut(container).ok_or_else(|| unknown(container))?;
    let plan = current.reorder(mapping, policy)?;
    let changed = plan.result.position_changes(current).len();
    *current = plan.result;
    Ok(Applied {
        changed,
        noop: changed == 0,
    })
}

fn diverging<C, I>(
    expected: &BTreeMap<C, OrderedContainer<I>>,
    observed: &BTreeMap<C, Vec<(I, i64)>>,
    out: &mut Vec<(String, Vec<String>, Vec<String>)>,
) where
    C: Ord + fmt::Display,
    I: Clone + Ord + fmt::Display,
{
    let empty = OrderedContainer::default();
    for (container, rows) in observed {
        let want: Vec<String> = expected
            .get(container)
            .unwrap_or(&empty)
            .items()
            .iter()
            .map(ToString::to_string)
            .collect();
        let got: Vec<String> = rows.iter().map(|(item, _)| item.to_string()).collect();
        if want != got {
            out.push((container.to_string(), want, got));
        }
    }
    for (container, items) in expected {
        if !observed.contains_key(container) && !items.is_empty() {
            let want = items.items().iter().map(ToString::to_string).collect();
            out.push((container.to_string(), want, Vec::new()));
        }
    }
}
