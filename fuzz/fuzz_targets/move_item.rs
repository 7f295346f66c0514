#![no_main]

use libfuzzer_sys::fuzz_target;
use tack_core::order::{OrderedContainer, OutOfRangePolicy, move_between};

fuzz_target!(|data: &[u8]| {
    let [source_len, target_len, pick, requested, flags, ..] = data else {
        return;
    };
    let source_len = u32::from(source_len % 12) + 1;
    let target_len = u32::from(target_len % 12);
    let policy = if flags & 1 == 0 {
        OutOfRangePolicy::Reject
    } else {
        OutOfRangePolicy::Clamp
    };
    let requested = i64::from(*requested as i8);
    let item = u32::from(*pick) % source_len;

    let Ok(source) = OrderedContainer::new((0..source_len).collect()) else {
        return;
    };
    let Ok(target) = OrderedContainer::new((100..100 + target_len).collect()) else {
        return;
    };

    if flags & 2 == 0 {
        let mut within = source.clone();
        match within.move_within(&item, requested, policy) {
            Ok(effect) => {
                assert_eq!(within.len(), source.len());
                assert_eq!(within.position_of(&item), Some(effect.to));
                let others = |c: &OrderedContainer<u32>| -> Vec<u32> {
                    c.items().iter().copied().filter(|i| *i != item).collect()
                };
                assert_eq!(others(&within), others(&source), "bystanders reordered");
                assert_eq!(effect.noop, within == source);
            }
            Err(_) => assert_eq!(within, source, "failed move changed the container"),
        }
        return;
    }

    let (mut s, mut t) = (source.clone(), target.clone());
    match move_between(&mut s, &mut t, &item, requested, policy) {
        Ok(effect) => {
            assert_eq!(s.len() + 1, source.len());
            assert_eq!(t.len(), target.len() + 1);
            assert_eq!(t.position_of(&item), Some(effect.to));
            assert!(!s.contains(&item));
        }
        Err(_) => {
            assert_eq!(s, source);
            assert_eq!(t, target);
        }
    }
});
