/// Validation tests for the CPU reference pipeline.
///
/// These verify the pipeline-level properties end to end:
/// 1. Output equals a comparison sort, index for index
/// 2. Output is non-decreasing and multiset-equal to the input
/// 3. Idempotence on already-sorted input
/// 4. Edge scenarios: empty input, all-equal input, partial partitions
#[cfg(test)]
mod tests {
    use crate::radix::{self, RadixConfig};
    use crate::validate_output;

    // ---------------------------------------------------------------
    // Helpers: deterministic test vectors
    // ---------------------------------------------------------------

    /// Deterministic pseudo-random u32 stream (xorshift32).
    fn random_keys(n: usize, mut seed: u32) -> Vec<u32> {
        (0..n)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed
            })
            .collect()
    }

    fn assert_sorts_correctly(keys: &[u32]) {
        let mut expected = keys.to_vec();
        expected.sort();

        let sorted = radix::sort(keys).unwrap();

        // Non-decreasing.
        assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        // Multiset-preserving and equal to the comparison sort: a sorted
        // permutation of the same multiset is unique, so one elementwise
        // comparison covers both.
        validate_output(&sorted, &expected).unwrap();
    }

    // ---------------------------------------------------------------
    // Scenarios
    // ---------------------------------------------------------------

    #[test]
    fn test_empty_input() {
        assert!(radix::sort(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_random_1024() {
        assert_sorts_correctly(&random_keys(1024, 0x0DEC_AFBA));
    }

    #[test]
    fn test_random_various_sizes() {
        for (n, seed) in [(1, 1), (2, 2), (127, 3), (128, 4), (129, 5), (4096, 6)] {
            assert_sorts_correctly(&random_keys(n, seed));
        }
    }

    #[test]
    fn test_all_equal_unchanged() {
        let keys = vec![0x5555_AAAAu32; 1000];
        assert_eq!(radix::sort(&keys).unwrap(), keys);
    }

    #[test]
    fn test_partial_last_partition() {
        let cfg = RadixConfig::default();
        assert_sorts_correctly(&random_keys(cfg.partition_size * 3 + 7, 0xBEEF));
    }

    #[test]
    fn test_idempotent_on_sorted_input() {
        let mut keys = random_keys(2048, 0xF00D);
        keys.sort();
        assert_eq!(radix::sort(&keys).unwrap(), keys);
    }

    #[test]
    fn test_reverse_sorted() {
        let keys: Vec<u32> = (0..2000u32).rev().collect();
        assert_sorts_correctly(&keys);
    }

    #[test]
    fn test_extreme_values() {
        let keys = vec![u32::MAX, 0, u32::MAX, 1, u32::MAX - 1, 0];
        assert_sorts_correctly(&keys);
    }

    #[test]
    fn test_low_entropy_keys() {
        // Many digit collisions: only two distinct values.
        let keys: Vec<u32> = (0..1500)
            .map(|i| if i % 3 == 0 { 7 } else { 0x7000_0007 })
            .collect();
        assert_sorts_correctly(&keys);
    }
}
