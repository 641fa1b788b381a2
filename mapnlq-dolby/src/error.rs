//! Dolby Vision error types.
//!
//! Covers RPU decoding, per-frame validation and clip setup. Every per-frame
//! failure is an owned value returned from the call that produced it.

// Error enum variants have many fields that are self-documenting via the error message
#![allow(missing_docs)]

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Dolby Vision operations.
pub type Result<T> = std::result::Result<T, DolbyError>;

/// Errors that can occur during RPU decoding and NLQ reconstruction.
#[derive(Debug, Error)]
pub enum DolbyError {
    /// Malformed RPU NAL framing (prefix, trailer, length).
    #[error("Invalid RPU data: {message}")]
    InvalidRpu { message: String },

    /// Unsupported RPU type.
    #[error("Unsupported RPU type: {rpu_type}")]
    UnsupportedRpuType { rpu_type: u8 },

    /// RPU payload uses syntax this decoder does not handle.
    #[error("Unsupported RPU syntax: {message}")]
    Unsupported { message: String },

    /// CRC check failed.
    #[error("RPU CRC check failed: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// The RPU header could not be decoded into usable parameters.
    #[error("{message}")]
    InvalidRpuHeader { message: String },

    /// The external RPU file could not be read or decoded.
    #[error("cannot parse RPU file {}: {message}", path.display())]
    RpuFile { path: PathBuf, message: String },

    /// Invalid filter configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The base and enhancement layer clips cannot be combined.
    #[error("{message}")]
    IncompatibleClips { message: String },

    /// No RPU exists for the frame.
    #[error("cannot parse RPU for frame {frame}")]
    RpuUnavailable { frame: usize },

    /// The inline RPU blob for the frame failed to decode.
    #[error("cannot parse RPU for frame {frame}: {message}")]
    RpuParseFailure { frame: usize, message: String },

    /// The NLQ curve does not have exactly one pivot.
    #[error("wrong pivots number: {pivots}")]
    WrongPivotCount { pivots: u64 },

    /// The RPU is not a profile 7 RPU.
    #[error("the RPU profile isn't 7 (got {profile})")]
    ProfileMismatch { profile: u8 },

    /// The residual is enabled but the RPU carries no NLQ parameters.
    #[error("the RPU enables the residual but carries no NLQ parameters")]
    MissingNlq,

    /// coefficient_log2_denom - 5 - el_bit_depth is negative.
    #[error(
        "invalid residual shift: coefficient_log2_denom {coefficient_log2_denom} - 5 - EL bit depth {el_bit_depth} is negative"
    )]
    InvalidResidualShift {
        coefficient_log2_denom: u64,
        el_bit_depth: u64,
    },

    /// Core frame, clip or bitstream error.
    #[error(transparent)]
    Core(#[from] mapnlq_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of a [`DolbyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Clip construction failed; no clip exists.
    Setup,
    /// No usable RPU for the frame.
    RpuUnavailable,
    /// NLQ pivot count is not 1.
    PivotCount,
    /// RPU header failed to decode.
    HeaderDecode,
    /// RPU profile is not 7.
    ProfileMismatch,
    /// Other per-frame metadata validation failure.
    Validation,
    /// RPU bitstream decoding failure.
    Decode,
    /// Frame acquisition or geometry failure.
    Frame,
}

impl DolbyError {
    /// Create an invalid RPU error.
    pub fn invalid_rpu(message: impl Into<String>) -> Self {
        DolbyError::InvalidRpu {
            message: message.into(),
        }
    }

    /// Create an unsupported syntax error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        DolbyError::Unsupported {
            message: message.into(),
        }
    }

    /// Create a header decode error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        DolbyError::InvalidRpuHeader {
            message: message.into(),
        }
    }

    /// Create an incompatible clips error.
    pub fn incompatible(message: impl Into<String>) -> Self {
        DolbyError::IncompatibleClips {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DolbyError::RpuFile { .. }
            | DolbyError::InvalidConfig { .. }
            | DolbyError::IncompatibleClips { .. } => ErrorKind::Setup,
            DolbyError::RpuUnavailable { .. } | DolbyError::RpuParseFailure { .. } => {
                ErrorKind::RpuUnavailable
            }
            DolbyError::WrongPivotCount { .. } => ErrorKind::PivotCount,
            DolbyError::InvalidRpuHeader { .. } => ErrorKind::HeaderDecode,
            DolbyError::ProfileMismatch { .. } => ErrorKind::ProfileMismatch,
            DolbyError::MissingNlq | DolbyError::InvalidResidualShift { .. } => {
                ErrorKind::Validation
            }
            DolbyError::InvalidRpu { .. }
            | DolbyError::UnsupportedRpuType { .. }
            | DolbyError::Unsupported { .. }
            | DolbyError::CrcMismatch { .. } => ErrorKind::Decode,
            DolbyError::Core(mapnlq_core::Error::Bitstream(_)) => ErrorKind::Decode,
            DolbyError::Core(_) | DolbyError::Io(_) => ErrorKind::Frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DolbyError::ProfileMismatch { profile: 8 };
        assert_eq!(err.to_string(), "the RPU profile isn't 7 (got 8)");

        let err = DolbyError::RpuUnavailable { frame: 3 };
        assert_eq!(err.to_string(), "cannot parse RPU for frame 3");

        let err = DolbyError::CrcMismatch {
            expected: 0xDEADBEEF,
            actual: 0x0376E6E7,
        };
        assert_eq!(
            err.to_string(),
            "RPU CRC check failed: expected 0xdeadbeef, got 0x0376e6e7"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DolbyError::incompatible("x").kind(), ErrorKind::Setup);
        assert_eq!(
            DolbyError::WrongPivotCount { pivots: 2 }.kind(),
            ErrorKind::PivotCount
        );
        assert_eq!(DolbyError::invalid_header("x").kind(), ErrorKind::HeaderDecode);
        assert_eq!(DolbyError::MissingNlq.kind(), ErrorKind::Validation);

        let bitstream: DolbyError =
            mapnlq_core::Error::from(mapnlq_core::BitstreamError::UnexpectedEnd).into();
        assert_eq!(bitstream.kind(), ErrorKind::Decode);
    }
}
