//! Small shared helpers.

/// Split a sequence into chunks of `size` elements; the last chunk holds the
/// remainder. Lazy, order-preserving, never yields an empty chunk.
///
/// Panics if `size == 0`, matching `slice::chunks`.
pub fn batch<I>(source: I, size: usize) -> Batched<I::IntoIter>
where
    I: IntoIterator,
{
    assert!(size > 0, "batch size must be greater than 0");
    Batched {
        inner: source.into_iter(),
        size,
    }
}

pub struct Batched<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.size);
        for item in self.inner.by_ref() {
            chunk.push(item);
            if chunk.len() == self.size {
                return Some(chunk);
            }
        }
        if chunk.is_empty() { None } else { Some(chunk) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_exact_and_remainder() {
        let chunks: Vec<Vec<i32>> = batch(1..=7, 3).collect();
        assert_eq!(chunks, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn test_batch_counts() {
        for (n, k) in [(10usize, 1usize), (10, 3), (10, 10), (10, 11), (1, 5)] {
            let chunks: Vec<Vec<usize>> = batch(0..n, k).collect();
            assert_eq!(chunks.len(), n.div_ceil(k));
            let flat: Vec<usize> = chunks.iter().flatten().copied().collect();
            assert_eq!(flat, (0..n).collect::<Vec<_>>());
            for c in &chunks[..chunks.len().saturating_sub(1)] {
                assert_eq!(c.len(), k);
            }
            assert!(!chunks.last().map(Vec::is_empty).unwrap_or(false));
        }
    }

    #[test]
    fn test_batch_empty_source() {
        let chunks: Vec<Vec<i32>> = batch(Vec::new(), 4).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    #[should_panic(expected = "batch size")]
    fn test_batch_zero_size_panics() {
        let _ = batch(vec![1], 0);
    }
}
