use haven_types::Coordinate;
use rand::seq::index;

/// Strategy for picking which cells of the square get sampled. Pluggable so
/// a deterministic, height-seeded scheme can replace the default without
/// touching the sampler.
pub trait CoordinateSelector: Send + Sync {
    /// Pick up to `amount` distinct coordinates from a `width` x `width`
    /// grid. Returns fewer only when the grid has fewer cells than asked
    /// for, in which case every cell is returned.
    fn select(&self, width: usize, amount: usize) -> Vec<Coordinate>;
}

/// Uniform sampling without replacement over the whole extended square.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandomSelector;

impl CoordinateSelector for UniformRandomSelector {
    fn select(&self, width: usize, amount: usize) -> Vec<Coordinate> {
        let cells = width * width;
        let amount = amount.min(cells);
        let mut rng = rand::thread_rng();
        index::sample(&mut rng, cells, amount)
            .into_iter()
            .map(|i| Coordinate::new(i / width, i % width))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sixteen_of_sixteen_by_sixteen_is_distinct() {
        let selector = UniformRandomSelector;
        for _ in 0..50 {
            let coords = selector.select(16, 16);
            assert_eq!(coords.len(), 16);
            let distinct: HashSet<_> = coords.iter().copied().collect();
            assert_eq!(distinct.len(), 16);
            assert!(coords.iter().all(|c| c.row < 16 && c.col < 16));
        }
    }

    #[test]
    fn test_oversized_request_returns_whole_grid() {
        let selector = UniformRandomSelector;
        let coords = selector.select(2, 100);
        assert_eq!(coords.len(), 4);
        let distinct: HashSet<_> = coords.iter().copied().collect();
        assert_eq!(distinct.len(), 4);
    }
}
