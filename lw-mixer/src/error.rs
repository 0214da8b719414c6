//! Error types
//!
//! Everything collapses onto the three integer codes of the C surface:
//! success, generic error and invalid format.

use crate::types::StreamParams;
use thiserror::Error;

pub const OK: i32 = 0;
pub const ERROR: i32 = -1;
pub const ERROR_INVALID_FORMAT: i32 = -2;

/// Failures reported by an output backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend open failed: {0}")]
    Open(String),
    #[error("output stream open failed: {0}")]
    StreamOpen(String),
    #[error("output stream start failed: {0}")]
    Start(String),
    #[error("output stream stop failed: {0}")]
    Stop(String),
}

/// Errors returned by the mixer API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LwError {
    #[error("{0}")]
    Error(String),
    #[error("stream format {got} does not match output format {expected}")]
    InvalidFormat {
        expected: StreamParams,
        got: StreamParams,
    },
    #[error("all {capacity} stream slots are in use")]
    PoolExhausted { capacity: usize },
    #[error("latency {0} ms is outside the accepted range")]
    InvalidLatency(u32),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LwError {
    /// Integer result code for this error
    pub fn code(&self) -> i32 {
        match self {
            LwError::InvalidFormat { .. } => ERROR_INVALID_FORMAT,
            _ => ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, LwError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleFormat;

    #[test]
    fn test_error_codes() {
        let got = StreamParams::new(SampleFormat::S16NE, 48000, 1);
        let invalid = LwError::InvalidFormat {
            expected: StreamParams::output(),
            got,
        };
        assert_eq!(invalid.code(), ERROR_INVALID_FORMAT);
        assert_eq!(LwError::PoolExhausted { capacity: 16 }.code(), ERROR);
        assert_eq!(LwError::InvalidLatency(0).code(), ERROR);
        assert_eq!(LwError::from(BackendError::Open("x".into())).code(), ERROR);
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err = LwError::from(BackendError::Start("device busy".into()));
        assert_eq!(err.to_string(), "output stream start failed: device busy");
    }
}
