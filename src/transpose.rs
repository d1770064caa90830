//! Row-major matrix transpose (CPU reference).

/// Transpose a row-major (rows x cols) matrix into (cols x rows).
///
/// Handles non-square, non-power-of-two shapes. The input length must equal
/// `rows * cols`; a mismatch is a programming error and panics.
pub fn transpose(input: &[u32], rows: usize, cols: usize) -> Vec<u32> {
    assert_eq!(input.len(), rows * cols, "shape does not cover the buffer");
    let mut out = vec![0u32; input.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = input[r * cols + c];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular() {
        // 2x3 -> 3x2
        let m = [1u32, 2, 3, 4, 5, 6];
        assert_eq!(transpose(&m, 2, 3), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_involution_non_square() {
        let rows = 7;
        let cols = 13;
        let m: Vec<u32> = (0..(rows * cols) as u32).collect();
        let t = transpose(&m, rows, cols);
        assert_eq!(transpose(&t, cols, rows), m);
    }

    #[test]
    fn test_single_row_and_column() {
        let m = [9u32, 8, 7];
        assert_eq!(transpose(&m, 1, 3), vec![9, 8, 7]);
        assert_eq!(transpose(&m, 3, 1), vec![9, 8, 7]);
    }

    #[test]
    fn test_empty() {
        assert!(transpose(&[], 0, 5).is_empty());
    }
}
