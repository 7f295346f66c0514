#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use tack_core::order::{OrderedContainer, UnknownItemPolicy};

fuzz_target!(|data: &[u8]| {
    let [len, flags, rest @ ..] = data else {
        return;
    };
    let len = u32::from(*len % 16);
    let policy = if flags & 1 == 0 {
        UnknownItemPolicy::Skip
    } else {
        UnknownItemPolicy::Reject
    };
    let Ok(container) = OrderedContainer::new((0..len).collect()) else {
        return;
    };

    // Item ids 16.. are never in the container.
    let mapping: BTreeMap<u32, i64> = rest
        .chunks_exact(2)
        .map(|pair| (u32::from(pair[0] % 24), i64::from(pair[1] as i8)))
        .collect();

    let Ok(plan) = container.reorder(&mapping, policy) else {
        return;
    };

    let mut sorted = plan.result.items().to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, container.items(), "reorder lost or duplicated items");

    for (item, &requested) in &mapping {
        match plan.result.position_of(item) {
            Some(slot) => assert_eq!(i64::try_from(slot).ok(), Some(requested)),
            None => assert!(plan.skipped.contains(item)),
        }
    }

    let again = plan
        .result
        .reorder(&mapping, policy)
        .expect("a satisfied mapping applies again");
    assert_eq!(again.result, plan.result, "reorder is not idempotent");
});
