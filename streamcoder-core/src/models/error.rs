use thiserror::Error;

use crate::processing::resampler::ResampleError;

/// Errors reported at the configuration and start boundaries of devices,
/// codecs, sinks and sessions.
///
/// Steady-state conditions on the realtime path (short ring reads/writes,
/// resampler hiccups) are not errors and are only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unrecognized option \"{0}\"")]
    UnsupportedOption(String),

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("sample rate converter: {0}")]
    ResampleFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<ResampleError> for StreamError {
    fn from(err: ResampleError) -> Self {
        Self::ResampleFailed(err.to_string())
    }
}
