//! Shuffle permutations
//!
//! Orders are expressed as permutations of natural queue indices: `order[i]`
//! is the natural index of the track at shuffled position `i`.

use rand::seq::SliceRandom;
use rand::Rng;

/// Random cyclic permutation (Sattolo's algorithm)
///
/// For more than one element no index stays in its natural position.
pub fn derangement<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.gen_range(0..i);
        order.swap(i, j);
    }
    order
}

/// Random permutation with `first` pinned at position 0
///
/// Used when shuffle is switched on mid-playback so the playing track stays
/// current.
pub fn pinned_first<R: Rng + ?Sized>(len: usize, first: usize, rng: &mut R) -> Vec<usize> {
    debug_assert!(first < len);
    let mut rest: Vec<usize> = (0..len).filter(|&i| i != first).collect();
    rest.shuffle(rng);

    let mut order = Vec::with_capacity(len);
    order.push(first);
    order.extend(rest);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn is_permutation(order: &[usize], len: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..len).collect::<Vec<_>>()
    }

    #[test]
    fn empty_and_single() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(derangement(0, &mut rng).is_empty());
        assert_eq!(derangement(1, &mut rng), vec![0]);
        assert_eq!(pinned_first(1, 0, &mut rng), vec![0]);
    }

    #[test]
    fn two_elements_swap() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(derangement(2, &mut rng), vec![1, 0]);
    }

    proptest! {
        #[test]
        fn derangement_moves_every_index(len in 2usize..64, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = derangement(len, &mut rng);
            prop_assert!(is_permutation(&order, len));
            for (position, &natural) in order.iter().enumerate() {
                prop_assert_ne!(position, natural);
            }
        }

        #[test]
        fn pinned_keeps_first(len in 1usize..64, pick in any::<prop::sample::Index>(), seed in any::<u64>()) {
            let first = pick.index(len);
            let mut rng = StdRng::seed_from_u64(seed);
            let order = pinned_first(len, first, &mut rng);
            prop_assert!(is_permutation(&order, len));
            prop_assert_eq!(order[0], first);
        }
    }
}
