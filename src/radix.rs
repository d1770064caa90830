//! LSD radix sort as an explicit multi-stage pipeline (CPU reference).
//!
//! The stages here mirror the GPU kernels in `kernels/radix_sort.wgsl` one
//! for one, including the flat-scan indexing scheme, so every intermediate
//! buffer of the GPU path has a directly comparable CPU counterpart.
//!
//! A pass over one digit runs:
//! 1. [`local_sort`] — stable pairwise-merge network inside each partition;
//! 2. [`histogram`] — per-partition digit counts (the G x D counting matrix);
//! 3. exclusive scan of the flat counting matrix (local offsets);
//! 4. transpose to D x G, then another exclusive scan (global offsets);
//! 5. [`scatter`] — write each element to its final position for the pass.
//!
//! Exactly `32 / digit_bits` passes run, least-significant digit first;
//! there is no early termination.

use crate::scan;
use crate::transpose;
use crate::{GpError, GpResult};

pub const DEFAULT_DIGIT_BITS: u32 = 4;
pub const DEFAULT_PARTITION_SIZE: usize = 128;

/// Upper bound on digit cardinality, shared with the GPU kernels'
/// workgroup histogram capacity (MAX_DIGITS in radix_sort.wgsl).
pub const MAX_DIGIT_COUNT: u32 = 256;

/// Radix sort tuning parameters.
///
/// `digit_bits` must evenly divide the 32-bit key width and keep the digit
/// cardinality within [`MAX_DIGIT_COUNT`], so the accepted values are 1, 2,
/// 4 and 8. `partition_size` must be a nonzero power of two; the GPU path
/// additionally requires it to equal the compiled workgroup width (128).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadixConfig {
    pub digit_bits: u32,
    pub partition_size: usize,
}

impl Default for RadixConfig {
    fn default() -> Self {
        Self {
            digit_bits: DEFAULT_DIGIT_BITS,
            partition_size: DEFAULT_PARTITION_SIZE,
        }
    }
}

impl RadixConfig {
    pub fn validate(&self) -> GpResult<()> {
        if self.digit_bits == 0 || 32 % self.digit_bits != 0 {
            return Err(GpError::InvalidConfig(
                "digit width must evenly divide the 32-bit key width",
            ));
        }
        if 1u32 << self.digit_bits > MAX_DIGIT_COUNT {
            return Err(GpError::InvalidConfig(
                "digit cardinality exceeds the per-partition histogram capacity",
            ));
        }
        if self.partition_size == 0 || !self.partition_size.is_power_of_two() {
            return Err(GpError::InvalidConfig(
                "partition size must be a nonzero power of two",
            ));
        }
        Ok(())
    }

    /// Digit cardinality D = 2^digit_bits.
    pub fn digit_count(&self) -> u32 {
        1 << self.digit_bits
    }

    /// Number of passes over the key array: 32 / digit_bits.
    pub fn pass_count(&self) -> u32 {
        32 / self.digit_bits
    }

    /// Bit offset of the digit processed in `pass`.
    pub fn shift_for(&self, pass: u32) -> u32 {
        pass * self.digit_bits
    }

    /// Mask selecting the digit processed in `pass`, already shifted.
    pub fn mask_for(&self, pass: u32) -> u32 {
        (self.digit_count() - 1) << self.shift_for(pass)
    }
}

/// One pairwise-merge step with half-width `m`: every element binary-searches
/// the opposite half of its 2m block for the number of elements that must
/// precede it, then writes itself to its merged rank. Left-half elements win
/// masked-key ties, so relative input order is preserved. The trailing
/// partial block is handled by clipping the search range to the live length.
pub fn local_merge_step(src: &[u32], dst: &mut [u32], mask: u32, m: usize) {
    let n = src.len();
    let pair_width = 2 * m;
    for (i, &v) in src.iter().enumerate() {
        let block_start = (i / pair_width) * pair_width;
        let in_left = i - block_start < m;
        let key = v & mask;

        let (lo, hi) = if in_left {
            ((block_start + m).min(n), (block_start + pair_width).min(n))
        } else {
            (block_start, (block_start + m).min(n))
        };
        let cross_rank = if in_left {
            src[lo..hi].partition_point(|&x| (x & mask) < key)
        } else {
            src[lo..hi].partition_point(|&x| (x & mask) <= key)
        };

        let pos_in_half = if in_left {
            i - block_start
        } else {
            i - block_start - m
        };
        dst[block_start + pos_in_half + cross_rank] = v;
    }
}

/// Stable-sort each partition by the active (masked) digit, running the
/// merge network with doubling half-widths 1, 2, 4, ... up to the partition
/// size. Merge blocks never cross partition boundaries because the
/// partition size is a power of two.
pub fn local_sort(keys: &mut Vec<u32>, scratch: &mut Vec<u32>, mask: u32, partition_size: usize) {
    let mut m = 1;
    while m < partition_size {
        local_merge_step(keys, scratch, mask, m);
        std::mem::swap(keys, scratch);
        m *= 2;
    }
}

/// Build the G x D counting matrix: `counts[g * D + d]` is the number of
/// elements in partition g whose active digit equals d. The trailing partial
/// partition contributes only its live elements.
pub fn histogram(keys: &[u32], config: &RadixConfig, mask: u32, shift: u32) -> Vec<u32> {
    let d_cnt = config.digit_count() as usize;
    let groups = keys.len().div_ceil(config.partition_size);
    let mut counts = vec![0u32; groups * d_cnt];
    for (i, &k) in keys.iter().enumerate() {
        let g = i / config.partition_size;
        let d = ((k & mask) >> shift) as usize;
        counts[g * d_cnt + d] += 1;
    }
    counts
}

/// Scatter locally-sorted elements to their final positions for the pass.
///
/// `local_sums` is the flat exclusive scan of the G x D counting matrix and
/// `global_sums` the flat exclusive scan of its D x G transpose. Element i
/// with digit d in partition g lands at
/// `global_sums[d*G + g] + i - local_sums[g*D + d]`: the scans' cross-row
/// carries (g * W on both sides) cancel, leaving run start plus in-run rank.
/// An out-of-range destination means an upstream invariant was violated and
/// faults immediately via slice indexing.
pub fn scatter(
    src: &[u32],
    dst: &mut [u32],
    local_sums: &[u32],
    global_sums: &[u32],
    config: &RadixConfig,
    mask: u32,
    shift: u32,
) {
    let d_cnt = config.digit_count() as usize;
    let groups = src.len().div_ceil(config.partition_size);
    for (i, &v) in src.iter().enumerate() {
        let d = ((v & mask) >> shift) as usize;
        let g = i / config.partition_size;
        let dest = (global_sums[d * groups + g] + i as u32 - local_sums[g * d_cnt + d]) as usize;
        dst[dest] = v;
    }
}

/// Sort unsigned 32-bit keys with the multi-stage LSD radix pipeline.
pub fn sort_with(keys: &[u32], config: &RadixConfig) -> GpResult<Vec<u32>> {
    config.validate()?;
    let n = keys.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let groups = n.div_ceil(config.partition_size);
    let d_cnt = config.digit_count() as usize;
    let mut current = keys.to_vec();
    let mut scratch = vec![0u32; n];

    for pass in 0..config.pass_count() {
        let mask = config.mask_for(pass);
        let shift = config.shift_for(pass);

        local_sort(&mut current, &mut scratch, mask, config.partition_size);

        let counts = histogram(&current, config, mask, shift);
        let local_sums = scan::exclusive(&counts);
        let transposed = transpose::transpose(&counts, groups, d_cnt);
        let global_sums = scan::exclusive(&transposed);

        scatter(
            &current,
            &mut scratch,
            &local_sums,
            &global_sums,
            config,
            mask,
            shift,
        );
        std::mem::swap(&mut current, &mut scratch);
    }

    Ok(current)
}

/// [`sort_with`] under the default configuration (4-bit digits, 8 passes).
pub fn sort(keys: &[u32]) -> GpResult<Vec<u32>> {
    sort_with(keys, &RadixConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = RadixConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.digit_count(), 16);
        assert_eq!(cfg.pass_count(), 8);
        assert_eq!(cfg.mask_for(0), 0xF);
        assert_eq!(cfg.mask_for(7), 0xF000_0000);
        assert_eq!(cfg.shift_for(3), 12);
    }

    #[test]
    fn test_config_rejections() {
        for bits in [0u32, 3, 5, 7, 16, 32] {
            let cfg = RadixConfig {
                digit_bits: bits,
                ..RadixConfig::default()
            };
            assert!(cfg.validate().is_err(), "digit_bits={bits}");
        }
        for w in [0usize, 3, 100] {
            let cfg = RadixConfig {
                partition_size: w,
                ..RadixConfig::default()
            };
            assert!(cfg.validate().is_err(), "partition_size={w}");
        }
    }

    #[test]
    fn test_local_sort_orders_each_partition_stably() {
        // Two partitions of 4; digit = low 4 bits. High bits tag the
        // original order so stability is observable.
        let cfg = RadixConfig {
            digit_bits: 4,
            partition_size: 4,
        };
        let mut keys = vec![
            0x103, 0x201, 0x303, 0x401, // partition 0
            0x502, 0x602, 0x700, 0x802, // partition 1
        ];
        let mut scratch = vec![0u32; keys.len()];
        local_sort(&mut keys, &mut scratch, cfg.mask_for(0), cfg.partition_size);
        assert_eq!(
            keys,
            vec![0x201, 0x401, 0x103, 0x303, 0x700, 0x502, 0x602, 0x802]
        );
    }

    #[test]
    fn test_histogram_rows_sum_to_partition_sizes() {
        let cfg = RadixConfig {
            digit_bits: 4,
            partition_size: 8,
        };
        // 3 full partitions plus 5 leftover elements.
        let keys: Vec<u32> = (0..29u32).map(|i| i.wrapping_mul(2654435761)).collect();
        let counts = histogram(&keys, &cfg, cfg.mask_for(0), 0);
        let groups = keys.len().div_ceil(cfg.partition_size);
        assert_eq!(counts.len(), groups * 16);
        for g in 0..groups {
            let live = cfg.partition_size.min(keys.len() - g * cfg.partition_size);
            let row_sum: u32 = counts[g * 16..(g + 1) * 16].iter().sum();
            assert_eq!(row_sum as usize, live, "partition {g}");
        }
    }

    #[test]
    fn test_histogram_all_equal_concentrates_in_one_bin() {
        let cfg = RadixConfig::default();
        let keys = vec![0xDEAD_BEEFu32; 300];
        for pass in 0..cfg.pass_count() {
            let mask = cfg.mask_for(pass);
            let shift = cfg.shift_for(pass);
            let counts = histogram(&keys, &cfg, mask, shift);
            let d = ((0xDEAD_BEEFu32 & mask) >> shift) as usize;
            let groups = keys.len().div_ceil(cfg.partition_size);
            for g in 0..groups {
                for other in 0..16 {
                    let expected = if other == d {
                        cfg.partition_size.min(keys.len() - g * cfg.partition_size) as u32
                    } else {
                        0
                    };
                    assert_eq!(counts[g * 16 + other], expected);
                }
            }
        }
    }

    #[test]
    fn test_single_pass_partitions_by_digit() {
        // After one full pass over the low digit, elements must form
        // contiguous runs ordered by digit value.
        let cfg = RadixConfig {
            digit_bits: 4,
            partition_size: 4,
        };
        let keys: Vec<u32> = vec![7, 3, 15, 3, 0, 9, 7, 1, 2, 14, 3, 3, 8];
        let mut current = keys.clone();
        let mut scratch = vec![0u32; keys.len()];
        let mask = cfg.mask_for(0);
        local_sort(&mut current, &mut scratch, mask, cfg.partition_size);
        let counts = histogram(&current, &cfg, mask, 0);
        let groups = keys.len().div_ceil(cfg.partition_size);
        let local_sums = scan::exclusive(&counts);
        let transposed = transpose::transpose(&counts, groups, 16);
        let global_sums = scan::exclusive(&transposed);
        scatter(
            &current,
            &mut scratch,
            &local_sums,
            &global_sums,
            &cfg,
            mask,
            0,
        );

        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(scratch, expected); // single digit pass suffices here
    }

    #[test]
    fn test_sort_partial_partition() {
        // Scenario: n is not a multiple of the partition size.
        let cfg = RadixConfig::default();
        let n = cfg.partition_size * 3 + 7;
        let keys: Vec<u32> = (0..n as u32).rev().map(|i| i.wrapping_mul(40503)).collect();
        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(sort_with(&keys, &cfg).unwrap(), expected);
    }

    #[test]
    fn test_sort_alternative_digit_widths() {
        let keys: Vec<u32> = (0..500u32).map(|i| i.wrapping_mul(2654435761)).collect();
        let mut expected = keys.clone();
        expected.sort();
        for digit_bits in [1, 2, 8] {
            let cfg = RadixConfig {
                digit_bits,
                ..RadixConfig::default()
            };
            assert_eq!(
                sort_with(&keys, &cfg).unwrap(),
                expected,
                "digit_bits={digit_bits}"
            );
        }
    }

    #[test]
    fn test_sort_small_partition_size() {
        let cfg = RadixConfig {
            digit_bits: 4,
            partition_size: 8,
        };
        let keys: Vec<u32> = (0..77u32).map(|i| (i * 7919) ^ 0xABCD).collect();
        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(sort_with(&keys, &cfg).unwrap(), expected);
    }
}
