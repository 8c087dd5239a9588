//! Seeded in-place shuffle.
//!
//! A single "hole" starts at position 0. Each of the `len` steps draws a
//! position uniformly from `[0, len)`, swaps it with the hole and moves the
//! hole there. Every step is a swap, so the result is always a permutation;
//! it is not uniformly distributed, which the frame does not need.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Shuffle `items` deterministically from `seed`.
///
/// Slices of length 0 or 1 are left untouched.
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let len = items.len();
    if len < 2 {
        return;
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut hole = 0usize;
    for _ in 0..len {
        let pick = rng.random_range(0..len);
        items.swap(hole, pick);
        hole = pick;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_and_single_are_noops() {
        let mut empty: [u16; 0] = [];
        shuffle(&mut empty, 1);
        let mut one = [42u16];
        shuffle(&mut one, 1);
        assert_eq!(one, [42]);
    }

    #[test]
    fn same_seed_same_order() {
        let mut a: std::vec::Vec<u16> = (0..50).collect();
        let mut b = a.clone();
        shuffle(&mut a, 0xDEAD_BEEF);
        shuffle(&mut b, 0xDEAD_BEEF);
        assert_eq!(a, b);
    }

    #[test]
    fn order_actually_changes() {
        let original: std::vec::Vec<u16> = (0..64).collect();
        let mut a = original.clone();
        shuffle(&mut a, 7);
        assert_ne!(a, original);
    }

    proptest! {
        #[test]
        fn shuffle_is_a_permutation(len in 0usize..600, seed in any::<u64>()) {
            let original: std::vec::Vec<u16> = (0..len as u16).collect();
            let mut shuffled = original.clone();
            shuffle(&mut shuffled, seed);
            let mut sorted = shuffled.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, original);
        }
    }
}
