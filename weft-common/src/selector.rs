//! Weighted lottery without replacement
//!
//! Every probabilistic decision in the craft pipeline — which program,
//! which instrument, which audio — goes through one of these pools so that
//! repeated fabrication of the same content does not always yield the same
//! arrangement. Candidates accumulate with a weight; each `pick` draws one
//! proportionally to weight and removes it from the pool. An empty pool
//! yields no selection rather than an error.

use rand::Rng;

/// One weighted entry awaiting the draw
#[derive(Debug, Clone)]
struct Entry<T> {
    weight: f64,
    candidate: T,
}

/// A weighted selection pool, drained by `pick`
#[derive(Debug, Clone)]
pub struct Selector<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Selector<T> {
    /// Empty pool
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add a candidate with the given weight
    ///
    /// Zero- and negative-weight entries are held but can never win while a
    /// positively weighted entry remains.
    pub fn add(&mut self, weight: f64, candidate: T) {
        self.entries.push(Entry { weight, candidate });
    }

    /// Number of candidates still in the pool
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no candidates remain
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw one candidate with probability proportional to weight,
    /// removing it from the pool
    ///
    /// Returns `None` from an empty pool. When the total positive weight is
    /// zero, falls back to a uniform draw over whatever is held.
    pub fn pick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<T> {
        if self.entries.is_empty() {
            return None;
        }

        let total: f64 = self.entries.iter().map(|e| e.weight.max(0.0)).sum();
        let index = if total > 0.0 {
            let mut roll = rng.gen_range(0.0..total);
            let mut chosen = self.entries.len() - 1;
            for (i, entry) in self.entries.iter().enumerate() {
                let w = entry.weight.max(0.0);
                if roll < w {
                    chosen = i;
                    break;
                }
                roll -= w;
            }
            chosen
        } else {
            rng.gen_range(0..self.entries.len())
        };

        Some(self.entries.swap_remove(index).candidate)
    }
}

impl<T> FromIterator<(f64, T)> for Selector<T> {
    fn from_iter<I: IntoIterator<Item = (f64, T)>>(iter: I) -> Self {
        let mut pool = Selector::new();
        for (weight, candidate) in iter {
            pool.add(weight, candidate);
        }
        pool
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_pool_yields_none() {
        let mut pool: Selector<&str> = Selector::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pool.pick(&mut rng), None);
    }

    #[test]
    fn test_pick_is_without_replacement() {
        let mut pool: Selector<u32> = [(1.0, 1), (1.0, 2), (1.0, 3)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(7);

        let mut drawn = vec![
            pool.pick(&mut rng).unwrap(),
            pool.pick(&mut rng).unwrap(),
            pool.pick(&mut rng).unwrap(),
        ];
        drawn.sort_unstable();
        assert_eq!(drawn, vec![1, 2, 3]);

        // depleted pool never returns a phantom pick
        assert_eq!(pool.pick(&mut rng), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_weight_proportional_distribution() {
        // entries (3, "a"), (1, "b"): over 10k fresh pools "a" wins ~75%
        let mut rng = StdRng::seed_from_u64(42);
        let mut a_wins = 0u32;
        const DRAWS: u32 = 10_000;

        for _ in 0..DRAWS {
            let mut pool: Selector<&str> = [(3.0, "a"), (1.0, "b")].into_iter().collect();
            if pool.pick(&mut rng) == Some("a") {
                a_wins += 1;
            }
        }

        let observed = a_wins as f64 / DRAWS as f64;
        assert!(
            (observed - 0.75).abs() < 0.02,
            "expected ~0.75, observed {}",
            observed
        );
    }

    #[test]
    fn test_zero_weight_loses_to_positive() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let mut pool: Selector<&str> = [(0.0, "never"), (1.0, "always")].into_iter().collect();
            assert_eq!(pool.pick(&mut rng), Some("always"));
        }
    }

    #[test]
    fn test_all_zero_weights_still_drain() {
        let mut pool: Selector<u32> = [(0.0, 1), (0.0, 2)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(9);
        assert!(pool.pick(&mut rng).is_some());
        assert!(pool.pick(&mut rng).is_some());
        assert_eq!(pool.pick(&mut rng), None);
    }
}
