//! Error types and C reason codes.

use thiserror::Error;

use crate::kernels::{ElementType, Metric};

/// Errors from a single kernel call.
///
/// Kernels are pure: the same inputs always fail with the same error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Divergence singularity at index {index}: reference has zero mass where compared distribution has mass")]
    Singularity { index: usize },

    #[error("Degenerate input: {0}")]
    DegenerateInput(&'static str),

    #[error("Unsupported width: {metric} does not accept {element} operands")]
    UnsupportedWidth { metric: Metric, element: ElementType },

    #[error("Invalid probability mass at index {index}: must be finite and non-negative")]
    InvalidMass { index: usize },
}

impl KernelError {
    pub fn code(&self) -> ReasonCode {
        match self {
            KernelError::LengthMismatch { .. } => ReasonCode::LengthMismatch,
            KernelError::Singularity { .. } => ReasonCode::Singularity,
            KernelError::DegenerateInput(_) => ReasonCode::DegenerateInput,
            KernelError::UnsupportedWidth { .. } => ReasonCode::UnsupportedWidth,
            KernelError::InvalidMass { .. } => ReasonCode::InvalidMass,
        }
    }
}

/// Errors that fail a whole batch call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Expected fixed size of {expected}, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("Invalid row layout: {0}")]
    InvalidLayout(String),

    #[error("Output buffer holds {found} slots, batch has {expected} rows")]
    OutputLength { expected: usize, found: usize },

    #[error("Unsupported width: {metric} does not accept {element} operands")]
    UnsupportedWidth { metric: Metric, element: ElementType },

    #[error("Row {row} failed: {source}")]
    RowFailed {
        row: usize,
        #[source]
        source: KernelError,
    },
}

impl BatchError {
    pub fn code(&self) -> ReasonCode {
        match self {
            BatchError::WidthMismatch { .. } => ReasonCode::LengthMismatch,
            BatchError::InvalidLayout(_) | BatchError::OutputLength { .. } => {
                ReasonCode::InvalidArgument
            }
            BatchError::UnsupportedWidth { .. } => ReasonCode::UnsupportedWidth,
            BatchError::RowFailed { source, .. } => source.code(),
        }
    }
}

/// Errors from building a batch configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Malformed kwargs: {0}")]
    Json(#[from] serde_json::Error),
}

/// Status codes returned across the C interface.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    Ok = 0,
    LengthMismatch = 1,
    Singularity = 2,
    DegenerateInput = 3,
    UnsupportedWidth = 4,
    InvalidMass = 5,
    NullPointer = 6,
    InvalidArgument = 7,
    /// Batch finished, some rows failed.
    Partial = 8,
    /// A panic was caught at the boundary.
    Internal = 9,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 10] = [
        ReasonCode::Ok,
        ReasonCode::LengthMismatch,
        ReasonCode::Singularity,
        ReasonCode::DegenerateInput,
        ReasonCode::UnsupportedWidth,
        ReasonCode::InvalidMass,
        ReasonCode::NullPointer,
        ReasonCode::InvalidArgument,
        ReasonCode::Partial,
        ReasonCode::Internal,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| *c as i32 == code)
    }

    /// Message with a trailing nul, shared with the C interface.
    pub(crate) fn message_with_nul(&self) -> &'static str {
        match self {
            ReasonCode::Ok => "ok\0",
            ReasonCode::LengthMismatch => "operand lengths differ\0",
            ReasonCode::Singularity => "divergence singularity\0",
            ReasonCode::DegenerateInput => "degenerate input\0",
            ReasonCode::UnsupportedWidth => "unsupported element width\0",
            ReasonCode::InvalidMass => "invalid probability mass\0",
            ReasonCode::NullPointer => "null pointer argument\0",
            ReasonCode::InvalidArgument => "invalid argument\0",
            ReasonCode::Partial => "some rows failed\0",
            ReasonCode::Internal => "internal error\0",
        }
    }

    pub fn message(&self) -> &'static str {
        let msg = self.message_with_nul();
        &msg[..msg.len() - 1]
    }
}

impl From<ReasonCode> for i32 {
    fn from(code: ReasonCode) -> Self {
        code as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_error_codes() {
        assert_eq!(
            KernelError::LengthMismatch { left: 3, right: 4 }.code(),
            ReasonCode::LengthMismatch
        );
        assert_eq!(KernelError::Singularity { index: 0 }.code(), ReasonCode::Singularity);
        assert_eq!(KernelError::DegenerateInput("x").code(), ReasonCode::DegenerateInput);
        assert_eq!(i32::from(ReasonCode::Partial), 8);
    }

    #[test]
    fn test_reason_codes_roundtrip() {
        for code in ReasonCode::ALL {
            assert_eq!(ReasonCode::from_code(code as i32), Some(code));
            assert!(!code.message().ends_with('\0'));
            assert!(code.message_with_nul().ends_with('\0'));
        }
        assert_eq!(ReasonCode::from_code(42), None);
        assert_eq!(ReasonCode::Singularity.message(), "divergence singularity");
    }

    #[test]
    fn test_width_mismatch_message() {
        let err = BatchError::WidthMismatch { expected: 3, found: 4 };
        assert_eq!(err.to_string(), "Expected fixed size of 3, found 4");
        assert_eq!(err.code(), ReasonCode::LengthMismatch);
    }

    #[test]
    fn test_row_failed_carries_kernel_code() {
        let err = BatchError::RowFailed {
            row: 2,
            source: KernelError::InvalidMass { index: 1 },
        };
        assert_eq!(err.code(), ReasonCode::InvalidMass);
        assert!(err.to_string().starts_with("Row 2 failed"));
    }
}
