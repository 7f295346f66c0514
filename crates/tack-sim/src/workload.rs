//! Seeded operation stream.
//!
//! Items are always picked by creation order and position, never by id,
//! so a seed replays the same choices even though store ids differ
//! between runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tack_core::model::{BoardId, CardId, ListId};
use tack_core::order::OrderedContainer;

use crate::layout::Model;
use crate::rng::DeterministicRng;

/// Relative weights of each operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpMix {
    pub move_card: u32,
    pub move_list: u32,
    pub reorder_cards: u32,
    pub reorder_lists: u32,
    pub create_card: u32,
    pub delete_card: u32,
}

impl Default for OpMix {
    fn default() -> Self {
        Self {
            move_card: 45,
            move_list: 10,
            reorder_cards: 20,
            reorder_lists: 5,
            create_card: 12,
            delete_card: 8,
        }
    }
}

impl OpMix {
    const fn total(&self) -> u32 {
        self.move_card
            + self.move_list
            + self.reorder_cards
            + self.reorder_lists
            + self.create_card
            + self.delete_card
    }

    fn roll(&self, rng: &mut DeterministicRng) -> OpKind {
        let total = self.total().max(1);
        let mut roll = rng.next_u32() % total;
        for (kind, weight) in [
            (OpKind::MoveCard, self.move_card),
            (OpKind::MoveList, self.move_list),
            (OpKind::ReorderCards, self.reorder_cards),
            (OpKind::ReorderLists, self.reorder_lists),
            (OpKind::CreateCard, self.create_card),
            (OpKind::DeleteCard, self.delete_card),
        ] {
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        OpKind::CreateCard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    MoveCard,
    MoveList,
    ReorderCards,
    ReorderLists,
    CreateCard,
    DeleteCard,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MoveCard => "move_card",
            Self::MoveList => "move_list",
            Self::ReorderCards => "reorder_cards",
            Self::ReorderLists => "reorder_lists",
            Self::CreateCard => "create_card",
            Self::DeleteCard => "delete_card",
        })
    }
}

/// One step of the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOp {
    MoveCard {
        card: CardId,
        target: ListId,
        position: i64,
    },
    MoveList {
        list: ListId,
        target: BoardId,
        position: i64,
    },
    ReorderCards {
        list: ListId,
        mapping: BTreeMap<CardId, i64>,
    },
    ReorderLists {
        board: BoardId,
        mapping: BTreeMap<ListId, i64>,
    },
    CreateCard {
        list: ListId,
        position: Option<i64>,
    },
    DeleteCard {
        card: CardId,
    },
}

impl SimOp {
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::MoveCard { .. } => OpKind::MoveCard,
            Self::MoveList { .. } => OpKind::MoveList,
            Self::ReorderCards { .. } => OpKind::ReorderCards,
            Self::ReorderLists { .. } => OpKind::ReorderLists,
            Self::CreateCard { .. } => OpKind::CreateCard,
            Self::DeleteCard { .. } => OpKind::DeleteCard,
        }
    }

    /// Whether the service reports a row count comparable with the model's.
    #[must_use]
    pub const fn reports_changes(&self) -> bool {
        !matches!(self, Self::CreateCard { .. })
    }
}

/// Knobs for [`next_op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub mix: OpMix,
    /// Chance that a position or reorder mapping is deliberately invalid:
    /// out of range, claimed twice, or naming a foreign item.
    pub stray_percent: u8,
    /// Chance that a move stays in its own container.
    pub same_container_percent: u8,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            mix: OpMix::default(),
            stray_percent: 10,
            same_container_percent: 50,
        }
    }
}

/// Pick the next operation. `boards` and `lists` are in creation order.
/// Returns `None` only when there is nothing to act on.
pub fn next_op(
    model: &Model,
    boards: &[BoardId],
    lists: &[ListId],
    rng: &mut DeterministicRng,
    workload: &Workload,
) -> Option<SimOp> {
    let first = workload.mix.roll(rng);
    let fallback = [
        first,
        OpKind::MoveCard,
        OpKind::CreateCard,
        OpKind::MoveList,
    ];
    fallback
        .into_iter()
        .find_map(|kind| build(kind, model, boards, lists, rng, workload))
}

fn build(
    kind: OpKind,
    model: &Model,
    boards: &[BoardId],
    lists: &[ListId],
    rng: &mut DeterministicRng,
    w: &Workload,
) -> Option<SimOp> {
    match kind {
        OpKind::MoveCard => {
            let cards = cards_in_order(model, lists);
            let (source, card) = rng.pick(&cards)?.clone();
            let target = if rng.hit_rate_percent(w.same_container_percent) {
                source.clone()
            } else {
                rng.pick(lists)?.clone()
            };
            let len = model.cards.get(&target).map_or(0, OrderedContainer::len);
            let max = if target == source { len - 1 } else { len };
            Some(SimOp::MoveCard {
                card,
                target,
                position: position(rng, max, w.stray_percent),
            })
        }
        OpKind::MoveList => {
            let placed = lists_in_order(model, boards);
            let (source, list) = rng.pick(&placed)?.clone();
            let target = if rng.hit_rate_percent(w.same_container_percent) {
                source.clone()
            } else {
                rng.pick(boards)?.clone()
            };
            let len = model.lists.get(&target).map_or(0, OrderedContainer::len);
            let max = if target == source { len - 1 } else { len };
            Some(SimOp::MoveList {
                list,
                target,
                position: position(rng, max, w.stray_percent),
            })
        }
        OpKind::ReorderCards => {
            let list = rng.pick(lists)?.clone();
            let items = model.cards.get(&list)?.items().to_vec();
            let foreign: Vec<CardId> = cards_in_order(model, lists)
                .into_iter()
                .filter(|(owner, _)| *owner != list)
                .map(|(_, card)| card)
                .collect();
            let mapping = mapping(rng, &items, &foreign, w.stray_percent);
            Some(SimOp::ReorderCards { list, mapping })
        }
        OpKind::ReorderLists => {
            let board = rng.pick(boards)?.clone();
            let items = model.lists.get(&board)?.items().to_vec();
            let foreign: Vec<ListId> = lists_in_order(model, boards)
                .into_iter()
                .filter(|(owner, _)| *owner != board)
                .map(|(_, list)| list)
                .collect();
            let mapping = mapping(rng, &items, &foreign, w.stray_percent);
            Some(SimOp::ReorderLists { board, mapping })
        }
        OpKind::CreateCard => {
            let list = rng.pick(lists)?.clone();
            let len = model.cards.get(&list).map_or(0, OrderedContainer::len);
            let position = if rng.hit_rate_percent(50) {
                None
            } else {
                Some(position(rng, len, w.stray_percent))
            };
            Some(SimOp::CreateCard { list, position })
        }
        OpKind::DeleteCard => {
            let cards = cards_in_order(model, lists);
            let (_, card) = rng.pick(&cards)?.clone();
            Some(SimOp::DeleteCard { card })
        }
    }
}

/// `(list, card)` for every card, lists in creation order.
fn cards_in_order(model: &Model, lists: &[ListId]) -> Vec<(ListId, CardId)> {
    lists
        .iter()
        .filter_map(|list| model.cards.get(list).map(|cards| (list, cards)))
        .flat_map(|(list, cards)| cards.items().iter().map(move |c| (list.clone(), c.clone())))
        .collect()
}

/// `(board, list)` for every placed list, boards in creation order.
fn lists_in_order(model: &Model, boards: &[BoardId]) -> Vec<(BoardId, ListId)> {
    boards
        .iter()
        .filter_map(|board| model.lists.get(board).map(|lists| (board, lists)))
        .flat_map(|(board, lists)| lists.items().iter().map(move |l| (board.clone(), l.clone())))
        .collect()
}

fn as_position(slot: usize) -> i64 {
    i64::try_from(slot).unwrap_or(i64::MAX)
}

/// A slot in `0..=max`, or occasionally one just outside it.
fn position(rng: &mut DeterministicRng, max: usize, stray_percent: u8) -> i64 {
    if rng.hit_rate_percent(stray_percent) {
        return match rng.next_index(3) {
            0 => -1,
            1 => as_position(max) + 1,
            _ => as_position(max) + 2 + as_position(rng.next_index(4)),
        };
    }
    as_position(rng.next_index(max + 1))
}

/// Distinct slots for a random subset of `items`, occasionally spoiled.
fn mapping<I: Clone + Ord>(
    rng: &mut DeterministicRng,
    items: &[I],
    foreign: &[I],
    stray_percent: u8,
) -> BTreeMap<I, i64> {
    let len = items.len();
    let mut slots: Vec<usize> = (0..len).collect();
    rng.shuffle(&mut slots);
    let mut named = items.to_vec();
    rng.shuffle(&mut named);
    let take = rng.next_index(len + 1);

    // Kept as a list until the end: the map orders by id, and ids differ
    // between runs of the same seed.
    let mut pairs: Vec<(I, i64)> = named
        .into_iter()
        .zip(slots)
        .take(take)
        .map(|(item, slot)| (item, as_position(slot)))
        .collect();

    if rng.hit_rate_percent(stray_percent) {
        match rng.next_index(3) {
            0 => {
                if let Some(item) = rng.pick(foreign) {
                    let slot = as_position(rng.next_index(len.max(1)));
                    pairs.push((item.clone(), slot));
                }
            }
            1 => {
                if let Some(item) = rng.pick(items) {
                    pairs.push((item.clone(), as_position(len)));
                }
            }
            _ => {
                if let [(_, first), (_, second), ..] = pairs.as_mut_slice() {
                    *second = *first;
                }
            }
        }
    }
    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> (Model, Vec<BoardId>, Vec<ListId>) {
        let board = BoardId::new("b-1");
        let lists = vec![ListId::new("l-1"), ListId::new("l-2")];
        let mut m = Model::default();
        m.lists.insert(
            board.clone(),
            OrderedContainer::new(lists.clone()).expect("lists"),
        );
        m.cards.insert(
            lists[0].clone(),
            OrderedContainer::new(vec![CardId::new("c-1"), CardId::new("c-2")]).expect("cards"),
        );
        m.cards.insert(lists[1].clone(), OrderedContainer::default());
        (m, vec![board], lists)
    }

    #[test]
    fn same_seed_same_ops() {
        let (m, boards, lists) = model();
        let w = Workload::default();
        let mut a = DeterministicRng::new(9);
        let mut b = DeterministicRng::new(9);
        for _ in 0..50 {
            assert_eq!(
                next_op(&m, &boards, &lists, &mut a, &w),
                next_op(&m, &boards, &lists, &mut b, &w)
            );
        }
    }

    #[test]
    fn clean_workload_stays_in_range() {
        let (m, boards, lists) = model();
        let w = Workload {
            stray_percent: 0,
            ..Workload::default()
        };
        let mut rng = DeterministicRng::new(4);
        for _ in 0..200 {
            let Some(op) = next_op(&m, &boards, &lists, &mut rng, &w) else {
                continue;
            };
            match op {
                SimOp::MoveCard { target, position, .. } => {
                    let len = m.cards[&target].len();
                    assert!((0..=as_position(len)).contains(&position));
                }
                SimOp::ReorderCards { list, mapping } => {
                    let len = as_position(m.cards[&list].len());
                    let mut seen = std::collections::BTreeSet::new();
                    for slot in mapping.values() {
                        assert!((0..len).contains(slot));
                        assert!(seen.insert(*slot), "slot claimed twice");
                    }
                }
                _ => {}
            }
        }
    }

    #[test]
    fn every_kind_is_reachable() {
        let (m, boards, lists) = model();
        let w = Workload::default();
        let mut rng = DeterministicRng::new(0);
        let mut kinds = std::collections::BTreeSet::new();
        for _ in 0..500 {
            if let Some(op) = next_op(&m, &boards, &lists, &mut rng, &w) {
                kinds.insert(op.kind());
            }
        }
        assert_eq!(kinds.len(), 6, "{kinds:?}");
    }
}
