//! Error types for the MapNLQ core primitives.
//!
//! Frame, clip, raw video and bitstream operations all report through [`Error`].

use thiserror::Error;

/// Main error type for the core crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bitstream parsing errors.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unsupported feature or format.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Requested frame is outside the clip.
    #[error("Frame {frame} out of range (clip has {num_frames} frames)")]
    FrameOutOfRange { frame: usize, num_frames: usize },

    /// Frame geometry does not match what the caller expects.
    #[error("Frame geometry mismatch: {0}")]
    Geometry(String),

    /// Buffer too small for operation.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// End of stream reached.
    #[error("End of stream")]
    EndOfStream,

    /// A filter clip failed to produce a frame.
    #[error("{0}")]
    Filter(Box<dyn std::error::Error + Send + Sync>),
}

/// Bitstream parsing errors.
#[derive(Error, Debug)]
pub enum BitstreamError {
    /// Unexpected end of bitstream.
    #[error("Unexpected end of bitstream")]
    UnexpectedEnd,

    /// Invalid syntax element value.
    #[error("Invalid syntax element: {element} = {value}")]
    InvalidSyntax { element: String, value: i64 },

    /// Exp-Golomb decoding error.
    #[error("Exp-Golomb decoding error: value too large")]
    ExpGolombOverflow,

    /// Value does not fit in the requested bit width.
    #[error("Value {value} does not fit in {bits} bits")]
    ValueTooWide { value: u64, bits: u8 },

    /// Generic bitstream error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for BitstreamError {
    fn from(s: String) -> Self {
        BitstreamError::Other(s)
    }
}

impl From<&str> for BitstreamError {
    fn from(s: &str) -> Self {
        BitstreamError::Other(s.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a geometry mismatch error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Error::Geometry(msg.into())
    }

    /// Check if this is an end-of-stream error.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidParameter("test parameter".into());
        assert_eq!(err.to_string(), "Invalid parameter: test parameter");

        let err = Error::FrameOutOfRange {
            frame: 12,
            num_frames: 10,
        };
        assert_eq!(
            err.to_string(),
            "Frame 12 out of range (clip has 10 frames)"
        );
    }

    #[test]
    fn test_bitstream_error_conversion() {
        let err: Error = BitstreamError::UnexpectedEnd.into();
        assert!(matches!(err, Error::Bitstream(BitstreamError::UnexpectedEnd)));
    }

    #[test]
    fn test_is_eof() {
        assert!(Error::EndOfStream.is_eof());
        assert!(!Error::unsupported("x").is_eof());
    }
}
