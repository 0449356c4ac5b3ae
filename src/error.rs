//! Crate-wide error taxonomy
//!
//! Every native return code is mapped into one of these variants; the raw
//! code is preserved in `Ffmpeg { code }` for diagnostics. `Again` and `Eof`
//! are protocol signals that drain loops recognize through [`Error::is_again`]
//! and [`Error::is_eof`].

use std::os::raw::c_int;

use crate::ffi::error as averror;
use crate::ffi::types::{CodecId, MediaKind};

/// Errors produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// End of stream (terminal, idempotent)
    #[error("end of stream")]
    Eof,

    /// Output not available yet / input not consumable yet
    #[error("resource temporarily unavailable")]
    Again,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),

    #[error("no decoder found for {0:?}")]
    DecoderNotFound(CodecId),

    #[error("no encoder found for {0}")]
    EncoderNotFound(String),

    #[error("i/o error in {op} (code {code})")]
    Io { op: &'static str, code: c_int },

    #[error("native shim unavailable: {0}")]
    ShimUnavailable(&'static str),

    #[error("ffmpeg libraries not loaded: {0}")]
    NotLoaded(String),

    #[error("component is closed")]
    Closed,

    #[error("no {0} stream in input")]
    NoStream(MediaKind),

    #[error("header already written")]
    HeaderAlreadyWritten,

    #[error("invalid stream index {0}")]
    InvalidStream(i32),

    #[error("{op} failed: {message} (code {code})")]
    Ffmpeg {
        op: &'static str,
        code: c_int,
        message: String,
    },

    #[error("shared library not found: {0}")]
    LibraryNotFound(String),

    #[error("symbol {symbol} not found in {library}")]
    SymbolNotFound {
        library: &'static str,
        symbol: &'static str,
    },

    #[error("{library} major version {found} outside supported range {min}..={max}")]
    IncompatibleVersion {
        library: &'static str,
        found: i32,
        min: i32,
        max: i32,
    },

    #[error("libraries must be opened leaves-first")]
    LoadOrderViolation,
}

impl Error {
    /// Map a negative FFmpeg return code into the taxonomy, attaching the
    /// operation name for diagnostics.
    pub fn from_av(op: &'static str, code: c_int) -> Self {
        match code {
            averror::AVERROR_EOF => Self::Eof,
            averror::AVERROR_EAGAIN => Self::Again,
            averror::AVERROR_ENOMEM => Self::OutOfMemory(op),
            averror::AVERROR_EIO | averror::AVERROR_ENOENT | averror::AVERROR_EXIT => {
                Self::Io { op, code }
            }
            averror::AVERROR_DECODER_NOT_FOUND => Self::DecoderNotFound(CodecId::None),
            averror::AVERROR_ENCODER_NOT_FOUND => Self::EncoderNotFound(op.to_string()),
            _ => Self::Ffmpeg {
                op,
                code,
                message: averror::error_message(code),
            },
        }
    }

    /// True for the end-of-stream protocol signal.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// True for the try-again protocol signal.
    pub fn is_again(&self) -> bool {
        matches!(self, Self::Again)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Check an FFmpeg return code, mapping negative values into [`Error`].
#[inline]
pub fn check(op: &'static str, ret: c_int) -> Result<c_int> {
    if ret < 0 {
        Err(Error::from_av(op, ret))
    } else {
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_signal_mapping() {
        assert!(Error::from_av("x", averror::AVERROR_EOF).is_eof());
        assert!(Error::from_av("x", averror::AVERROR_EAGAIN).is_again());
        assert!(!Error::from_av("x", averror::AVERROR_EINVAL).is_eof());
    }

    #[test]
    fn test_io_mapping() {
        match Error::from_av("open", averror::AVERROR_ENOENT) {
            Error::Io { op, code } => {
                assert_eq!(op, "open");
                assert_eq!(code, averror::AVERROR_ENOENT);
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_check() {
        assert!(check("x", 0).is_ok());
        assert!(check("x", 42).is_ok());
        assert!(check("x", -1).is_err());
    }

    #[test]
    fn test_raw_code_preserved() {
        match Error::from_av("probe", averror::AVERROR_INVALIDDATA) {
            Error::Ffmpeg { code, .. } => assert_eq!(code, averror::AVERROR_INVALIDDATA),
            other => panic!("expected Ffmpeg, got {other:?}"),
        }
    }
}
