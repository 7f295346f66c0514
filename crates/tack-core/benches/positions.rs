use std::collections::BTreeMap;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rusqlite::Connection;
use tack_core::Service;
use tack_core::authz::AllowAll;
use tack_core::config::ProjectConfig;
use tack_core::db::{DEFAULT_BUSY_TIMEOUT, configure_connection, migrations, query};
use tack_core::model::{CardId, ListId, UserId};
use tack_core::order::{OrderedContainer, OutOfRangePolicy, UnknownItemPolicy};
use tack_core::service::NewCard;

const SIZES: [usize; 3] = [10, 100, 1_000];

fn container(n: usize) -> OrderedContainer<String> {
    OrderedContainer::new((0..n).map(|i| format!("c-{i:05}")).collect()).expect("unique ids")
}

fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("order");

    for n in SIZES {
        let base = container(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("move_last_to_front", n), &base, |b, base| {
            let last = base.items()[n - 1].clone();
            b.iter(|| {
                let mut items = base.clone();
                black_box(items.move_within(&last, 0, OutOfRangePolicy::Reject))
            });
        });

        let mapping: BTreeMap<String, i64> = base
            .items()
            .iter()
            .step_by(10)
            .enumerate()
            .map(|(i, item)| (item.clone(), i64::try_from(n - 1 - i).unwrap_or(0)))
            .collect();
        group.bench_with_input(BenchmarkId::new("reorder_tenth", n), &base, |b, base| {
            b.iter(|| black_box(base.reorder(&mapping, UnknownItemPolicy::Skip)));
        });

        group.bench_with_input(BenchmarkId::new("position_changes", n), &base, |b, base| {
            let mut moved = base.clone();
            let first = base.items()[0].clone();
            let _ = moved.move_within(
                &first,
                i64::try_from(n - 1).unwrap_or(0),
                OutOfRangePolicy::Reject,
            );
            b.iter(|| black_box(moved.position_changes(base)));
        });
    }

    group.finish();
}

fn service_with_list(n: usize) -> (Service<AllowAll>, UserId, ListId, Vec<CardId>) {
    let mut conn = Connection::open_in_memory().expect("open");
    configure_connection(&conn, DEFAULT_BUSY_TIMEOUT).expect("pragmas");
    migrations::migrate(&mut conn).expect("migrate");
    let mut svc = Service::with_parts(conn, ProjectConfig::default(), AllowAll);

    let user = UserId::new("bench");
    let board = svc.create_board(&user, "Bench", "").expect("board").id;
    let list = svc.create_list(&user, &board, "List", None).expect("list").id;
    for i in 0..n {
        svc.create_card(&user, &list, &NewCard::titled(format!("card {i}")), None)
            .expect("card");
    }
    let cards = query::cards_for_list(svc.connection(), &list)
        .expect("cards")
        .into_iter()
        .map(|card| card.id)
        .collect();
    (svc, user, list, cards)
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    for n in SIZES {
        let (mut svc, user, list, cards) = service_with_list(n);
        let last = cards[n - 1].clone();
        let tail = i64::try_from(n - 1).unwrap_or(0);

        // Bounce one card between the ends so every iteration shifts the
        // whole list.
        let mut flip = false;
        group.bench_function(BenchmarkId::new("move_card_end_to_end", n), |b| {
            b.iter(|| {
                flip = !flip;
                let slot = if flip { 0 } else { tail };
                black_box(svc.move_card(&user, &last, &list, slot).expect("move"))
            });
        });

        group.bench_function(BenchmarkId::new("noop_move", n), |b| {
            b.iter(|| {
                let current = query::cards_for_list(svc.connection(), &list).expect("cards");
                let head = current[0].id.clone();
                black_box(svc.move_card(&user, &head, &list, 0).expect("noop"))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ordering, bench_store);
criterion_main!(benches);
