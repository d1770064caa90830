//! Hillis-Steele doubling prefix scan (CPU reference).
//!
//! Mirrors the GPU `prefix_sum` / `shift_right` kernels step for step:
//! one doubling step per call, the full scan as a loop of steps over a
//! ping-ponged buffer pair, and a shift-right pass to turn the inclusive
//! scan into an exclusive one. O(log L) steps, O(L log L) total work.

/// One doubling step: `dst[i] = src[i] + src[i - offset]`, the out-of-range
/// term treated as zero. Addition wraps, matching u32 arithmetic on the GPU.
pub fn scan_step(src: &[u32], dst: &mut [u32], offset: usize) {
    assert_eq!(src.len(), dst.len());
    for i in 0..src.len() {
        dst[i] = if i >= offset {
            src[i].wrapping_add(src[i - offset])
        } else {
            src[i]
        };
    }
}

/// Inclusive prefix sum via iterative doubling.
pub fn inclusive(values: &[u32]) -> Vec<u32> {
    let mut current = values.to_vec();
    let mut scratch = vec![0u32; values.len()];
    let mut offset = 1;
    while offset < values.len() {
        scan_step(&current, &mut scratch, offset);
        std::mem::swap(&mut current, &mut scratch);
        offset *= 2;
    }
    current
}

/// `dst[i] = src[i - 1]`, zero for i = 0.
pub fn shift_right(src: &[u32], dst: &mut [u32]) {
    assert_eq!(src.len(), dst.len());
    for i in 0..src.len() {
        dst[i] = if i == 0 { 0 } else { src[i - 1] };
    }
}

/// Exclusive prefix sum: inclusive scan followed by a shift-right step.
pub fn exclusive(values: &[u32]) -> Vec<u32> {
    let inc = inclusive(values);
    let mut out = vec![0u32; values.len()];
    shift_right(&inc, &mut out);
    out
}
