use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};

/// Randomness used by itinerary assembly. Injected so callers can pin or
/// script the draws.
pub trait RandomSource {
    /// Uniform shuffle of `0..len`.
    fn permutation(&mut self, len: usize) -> Vec<usize>;

    /// Up to `amount` distinct indices from `0..len`, in draw order.
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize>;
}

#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order = (0..len).collect::<Vec<_>>();
        order.shuffle(&mut self.rng);
        order
    }

    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
        index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn permutation_covers_every_index() {
        let mut source = RngSource::seeded(11);
        let mut order = source.permutation(6);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn sample_is_without_replacement_and_capped() {
        let mut source = RngSource::seeded(5);
        let picked = source.sample(3, 5);
        assert_eq!(picked.len(), 3);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 3);
        assert!(source.sample(0, 5).is_empty());
    }

    #[test]
    fn seeded_sources_repeat() {
        let mut a = RngSource::seeded(99);
        let mut b = RngSource::seeded(99);
        assert_eq!(a.sample(40, 5), b.sample(40, 5));
    }
}
