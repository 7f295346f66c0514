//! Move and reorder scenarios against a file-backed store.

use std::collections::BTreeMap;

use tack_core::db::query;
use tack_core::error::{ConflictReason, ErrorCode, TackError};
use tack_core::model::{BoardId, CardId, ListId, UserId};
use tack_core::order::is_dense;
use tack_core::service::NewCard;
use tack_core::Service;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    svc: Service,
    alice: UserId,
    board: BoardId,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut svc = Service::init(dir.path()).expect("init store");
        let alice = UserId::new("alice");
        let board = svc
            .create_board(&alice, "Roadmap", "")
            .expect("create board")
            .id;
        Self {
            _dir: dir,
            svc,
            alice,
            board,
        }
    }

    fn list(&mut self, title: &str, cards: &[&str]) -> (ListId, Vec<CardId>) {
        let list = self
            .svc
            .create_list(&self.alice, &self.board, title, None)
            .expect("create list")
            .id;
        let ids = cards
            .iter()
            .map(|title| {
                self.svc
                    .create_card(&self.alice, &list, &NewCard::titled(*title), None)
                    .expect("create card")
                    .id
            })
            .collect();
        (list, ids)
    }

    fn titles(&self, list: &ListId) -> Vec<String> {
        let cards = query::cards_for_list(self.svc.connection(), list).expect("cards");
        assert!(
            is_dense(cards.iter().map(|c| c.position)),
            "positions of {list} are not dense: {cards:?}"
        );
        cards.into_iter().map(|c| c.title).collect()
    }

    fn cards_version(&self, list: &ListId) -> i64 {
        query::require_list(self.svc.connection(), list)
            .expect("list")
            .cards_version
    }
}

#[test]
fn move_within_list_to_front() {
    let mut fx = Fixture::new();
    let (list, ids) = fx.list("Todo", &["A", "B", "C"]);

    let outcome = fx
        .svc
        .move_card(&fx.alice, &ids[1], &list, 0)
        .expect("move");

    assert_eq!(fx.titles(&list), ["B", "A", "C"]);
    assert_eq!((outcome.from, outcome.to), (1, 0));
    assert_eq!(outcome.changed, 2);
}

#[test]
fn move_across_lists_appends() {
    let mut fx = Fixture::new();
    let (l1, ids) = fx.list("Todo", &["A", "B"]);
    let (l2, _) = fx.list("Done", &["C"]);

    fx.svc.move_card(&fx.alice, &ids[0], &l2, 1).expect("move");

    assert_eq!(fx.titles(&l1), ["B"]);
    assert_eq!(fx.titles(&l2), ["C", "A"]);
}

#[test]
fn move_across_lists_into_the_middle() {
    let mut fx = Fixture::new();
    let (l1, ids) = fx.list("Todo", &["A", "B", "C"]);
    let (l2, _) = fx.list("Done", &["X", "Y", "Z"]);

    fx.svc.move_card(&fx.alice, &ids[1], &l2, 1).expect("move");

    assert_eq!(fx.titles(&l1), ["A", "C"]);
    assert_eq!(fx.titles(&l2), ["X", "B", "Y", "Z"]);
}

#[test]
fn reorder_swaps_and_fills_free_slot() {
    let mut fx = Fixture::new();
    let (list, ids) = fx.list("Todo", &["A", "B", "C"]);
    let mapping: BTreeMap<CardId, i64> = [(ids[1].clone(), 0), (ids[0].clone(), 1)]
        .into_iter()
        .collect();

    let outcome = fx
        .svc
        .reorder_cards(&fx.alice, &list, &mapping, None)
        .expect("reorder");

    assert_eq!(fx.titles(&list), ["B", "A", "C"]);
    assert_eq!(outcome.changed, 2);
    assert!(outcome.skipped.is_empty());
}

#[test]
fn reorder_skips_cards_from_other_lists() {
    let mut fx = Fixture::new();
    let (l1, ids) = fx.list("Todo", &["A", "B"]);
    let (_, foreign) = fx.list("Done", &["Z"]);
    let mapping: BTreeMap<CardId, i64> = [(foreign[0].clone(), 0), (ids[1].clone(), 0)]
        .into_iter()
        .collect();

    let outcome = fx
        .svc
        .reorder_cards(&fx.alice, &l1, &mapping, None)
        .expect("reorder");

    assert_eq!(fx.titles(&l1), ["B", "A"]);
    assert_eq!(outcome.skipped, [foreign[0].to_string()]);
}

#[test]
fn reorder_lists_on_board() {
    let mut fx = Fixture::new();
    let (todo, _) = fx.list("Todo", &[]);
    let (doing, _) = fx.list("Doing", &[]);
    let (done, _) = fx.list("Done", &[]);
    let mapping: BTreeMap<ListId, i64> = [(done.clone(), 0)].into_iter().collect();

    let outcome = fx
        .svc
        .reorder_lists(&fx.alice, &fx.board, &mapping, None)
        .expect("reorder");

    assert_eq!(
        outcome.order,
        [done.to_string(), todo.to_string(), doing.to_string()]
    );
}

#[test]
fn noop_move_leaves_version_untouched() {
    let mut fx = Fixture::new();
    let (list, ids) = fx.list("Todo", &["A", "B", "C"]);
    let version = fx.cards_version(&list);

    let outcome = fx
        .svc
        .move_card(&fx.alice, &ids[2], &list, 2)
        .expect("move");

    assert!(outcome.noop);
    assert_eq!(fx.cards_version(&list), version);
    assert_eq!(fx.titles(&list), ["A", "B", "C"]);
}

#[test]
fn out_of_range_moves_are_rejected_without_side_effects() {
    let mut fx = Fixture::new();
    let (l1, ids) = fx.list("Todo", &["A", "B", "C"]);
    let (l2, _) = fx.list("Done", &["X"]);

    let same = fx.svc.move_card(&fx.alice, &ids[0], &l1, 3).unwrap_err();
    assert_eq!(same.error_code(), ErrorCode::InvalidPosition);

    let cross = fx.svc.move_card(&fx.alice, &ids[0], &l2, 2).unwrap_err();
    assert_eq!(cross.error_code(), ErrorCode::InvalidPosition);

    let negative = fx.svc.move_card(&fx.alice, &ids[0], &l2, -1).unwrap_err();
    assert_eq!(negative.error_code(), ErrorCode::InvalidPosition);

    assert_eq!(fx.titles(&l1), ["A", "B", "C"]);
    assert_eq!(fx.titles(&l2), ["X"]);
}

#[test]
fn unknown_card_or_list_is_not_found() {
    let mut fx = Fixture::new();
    let (list, ids) = fx.list("Todo", &["A"]);

    let err = fx
        .svc
        .move_card(&fx.alice, &CardId::new("c-missing"), &list, 0)
        .unwrap_err();
    assert!(matches!(err, TackError::NotFound { entity: "card", .. }));

    let err = fx
        .svc
        .move_card(&fx.alice, &ids[0], &ListId::new("l-missing"), 0)
        .unwrap_err();
    assert!(matches!(err, TackError::NotFound { entity: "list", .. }));
}

#[test]
fn moves_into_a_board_owned_by_someone_else_are_forbidden() {
    let mut fx = Fixture::new();
    let (l1, ids) = fx.list("Todo", &["A"]);

    let bob = UserId::new("bob");
    let bobs_board = fx.svc.create_board(&bob, "Private", "").expect("board").id;
    let bobs_list = fx
        .svc
        .create_list(&bob, &bobs_board, "Inbox", None)
        .expect("list")
        .id;

    let err = fx
        .svc
        .move_card(&fx.alice, &ids[0], &bobs_list, 0)
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::Forbidden);
    assert_eq!(fx.titles(&l1), ["A"]);

    let err = fx
        .svc
        .move_list(&fx.alice, &l1, &bobs_board, 0)
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::Forbidden);
}

#[test]
fn lists_move_between_boards_the_caller_owns() {
    let mut fx = Fixture::new();
    let (l1, _) = fx.list("Todo", &["A", "B"]);
    let (l2, _) = fx.list("Doing", &[]);
    let other = fx
        .svc
        .create_board(&fx.alice, "Archive", "")
        .expect("board")
        .id;

    fx.svc.move_list(&fx.alice, &l1, &other, 0).expect("move list");

    let home = query::lists_for_board(fx.svc.connection(), &fx.board).expect("lists");
    assert_eq!(home.len(), 1);
    assert_eq!((home[0].id.clone(), home[0].position), (l2, 0));

    let away = query::lists_for_board(fx.svc.connection(), &other).expect("lists");
    assert_eq!(away[0].id, l1);
    assert_eq!(fx.titles(&l1), ["A", "B"]);
}

#[test]
fn stale_expected_version_is_a_conflict() {
    let mut fx = Fixture::new();
    let (list, ids) = fx.list("Todo", &["A", "B", "C"]);
    let seen = fx.cards_version(&list);

    fx.svc.move_card(&fx.alice, &ids[2], &list, 0).expect("concurrent move");

    let mapping: BTreeMap<CardId, i64> = [(ids[0].clone(), 2)].into_iter().collect();
    let err = fx
        .svc
        .reorder_cards(&fx.alice, &list, &mapping, Some(seen))
        .unwrap_err();
    assert!(matches!(
        err,
        TackError::Conflict {
            reason: ConflictReason::StaleVersion { .. },
            ..
        }
    ));
    assert_eq!(fx.titles(&list), ["C", "A", "B"]);
}

#[test]
fn two_cards_claiming_one_slot_is_rejected() {
    let mut fx = Fixture::new();
    let (list, ids) = fx.list("Todo", &["A", "B", "C"]);
    let mapping: BTreeMap<CardId, i64> = [(ids[0].clone(), 1), (ids[2].clone(), 1)]
        .into_iter()
        .collect();

    let err = fx
        .svc
        .reorder_cards(&fx.alice, &list, &mapping, None)
        .unwrap_err();
    assert!(matches!(err, TackError::PositionClaimedTwice { position: 1 }));
    assert_eq!(fx.titles(&list), ["A", "B", "C"]);
}
