pub mod radix;
pub mod scan;
pub mod transpose;

#[cfg(feature = "webgpu")]
pub mod webgpu;

#[cfg(test)]
mod validation;

/// Error types for gpuprims operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GpError {
    /// No usable compute device, or the device rejected a required feature.
    Unsupported,
    /// A host transfer exceeds the allocated device capacity.
    BufferTooSmall { requested: usize, capacity: usize },
    /// A stage dispatch exceeded device limits or failed to issue.
    Dispatch { stage: &'static str },
    /// A pipeline configuration parameter is out of contract.
    InvalidConfig(&'static str),
    /// GPU output diverged from the reference at an index.
    Mismatch { index: usize, got: u32, expected: u32 },
}

impl std::fmt::Display for GpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported => write!(f, "no usable compute device"),
            Self::BufferTooSmall {
                requested,
                capacity,
            } => write!(
                f,
                "transfer of {requested} elements exceeds buffer capacity {capacity}"
            ),
            Self::Dispatch { stage } => write!(f, "dispatch failed in stage {stage}"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Mismatch {
                index,
                got,
                expected,
            } => write!(
                f,
                "result mismatch at index {index}: got {got}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for GpError {}

pub type GpResult<T> = Result<T, GpError>;

/// Compare a pipeline output elementwise against a reference and report the
/// first differing index as a hard failure.
pub fn validate_output(got: &[u32], expected: &[u32]) -> GpResult<()> {
    if got.len() != expected.len() {
        return Err(GpError::InvalidConfig(
            "output length differs from reference",
        ));
    }
    for (index, (&g, &e)) in got.iter().zip(expected.iter()).enumerate() {
        if g != e {
            return Err(GpError::Mismatch {
                index,
                got: g,
                expected: e,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_ok() {
        assert_eq!(validate_output(&[1, 2, 3], &[1, 2, 3]), Ok(()));
        assert_eq!(validate_output(&[], &[]), Ok(()));
    }

    #[test]
    fn test_validate_output_reports_first_mismatch() {
        let err = validate_output(&[1, 2, 9, 9], &[1, 2, 3, 4]).unwrap_err();
        assert_eq!(
            err,
            GpError::Mismatch {
                index: 2,
                got: 9,
                expected: 3
            }
        );
    }

    #[test]
    fn test_validate_output_length_mismatch() {
        assert!(validate_output(&[1], &[1, 2]).is_err());
    }
}
