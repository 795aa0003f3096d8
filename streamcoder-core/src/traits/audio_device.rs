use std::sync::Arc;

use crate::models::audio_models::DeviceKind;
use crate::models::error::StreamError;
use crate::traits::device_delegate::DeviceDelegate;

/// Interface for audio capture backends.
///
/// A device is built around the producer half of the session's ring buffer
/// and writes interleaved `f32` frames in the stream's channel layout.
/// Implemented by:
/// - `FileDevice` (WAV file playback)
/// - `SignalDevice` (test tone)
/// - `CpalDevice` (hardware input, `cpal` feature)
pub trait AudioDevice {
    fn kind(&self) -> DeviceKind;

    /// Whether this backend can run in the current build and environment.
    ///
    /// Has no side effects.
    fn is_available(&self) -> bool;

    /// Channel count written to the ring buffer.
    fn channels(&self) -> usize;

    /// Applies backend-specific `key=value` options. Keys may carry a
    /// leading `--`. Unknown keys are rejected.
    fn process_options(&mut self, options: &[(String, String)]) -> Result<(), StreamError>;

    /// Starts capturing. Does not block; audio is delivered from a device
    /// thread or OS callback. A second call is rejected.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Stops capturing and releases the device.
    fn stop(&mut self) -> Result<(), StreamError>;

    /// Sample rate of the delivered audio, which may differ from the rate the
    /// device was created with.
    fn device_samplerate(&self) -> u32;

    /// Per-channel meter levels in hundredths of a dB below full scale.
    fn meter_levels(&self) -> Vec<i32>;

    /// Lets audio through on devices that start muted.
    fn unmute(&mut self) {}

    fn set_delegate(&mut self, delegate: Arc<dyn DeviceDelegate>);
}

/// Strips the command-line `--` prefix from a device option key.
pub fn option_key(key: &str) -> &str {
    key.strip_prefix("--").unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_key_accepts_both_spellings() {
        assert_eq!(option_key("--file-name"), "file-name");
        assert_eq!(option_key("file-name"), "file-name");
    }
}
