use serde::{Deserialize, Serialize};

/// Tiny deterministic RNG used by the simulator.
///
/// A 64-bit LCG; callers only ever see the high half of each state, whose
/// period is far better than the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Next pseudo-random `u32`.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        u32::try_from(self.state >> 32).unwrap_or(u32::MAX)
    }

    /// Next value in `[0, upper_exclusive)`; 0 when the range is empty.
    pub fn next_index(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        let roll = usize::try_from(self.next_u32()).unwrap_or(usize::MAX);
        roll % upper_exclusive
    }

    /// Bernoulli trial with integer percent.
    pub fn hit_rate_percent(&mut self, percent: u8) -> bool {
        if percent == 0 {
            return false;
        }
        if percent >= 100 {
            return true;
        }
        self.next_index(100) < usize::from(percent)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_index(items.len()))
    }

    /// Fisher-Yates, in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DeterministicRng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = DeterministicRng::new(7);
        let mut b = DeterministicRng::new(7);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn small_ranges_do_not_alternate() {
        let mut rng = DeterministicRng::new(3);
        let rolls: Vec<usize> = (0..16).map(|_| rng.next_index(2)).collect();
        let alternating = rolls.windows(2).all(|w| w[0] != w[1]);
        assert!(!alternating, "{rolls:?}");
    }

    #[test]
    fn index_stays_in_range() {
        let mut rng = DeterministicRng::new(11);
        assert_eq!(rng.next_index(0), 0);
        for upper in 1..20 {
            assert!(rng.next_index(upper) < upper);
        }
    }

    #[test]
    fn shuffle_keeps_every_item() {
        let mut rng = DeterministicRng::new(5);
        let mut items: Vec<u32> = (0..10).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn hit_rate_extremes() {
        let mut rng = DeterministicRng::new(1);
        assert!(!rng.hit_rate_percent(0));
        assert!(rng.hit_rate_percent(100));
    }
}
