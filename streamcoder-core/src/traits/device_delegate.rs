use crate::models::error::StreamError;

/// Notifications from a running device to its owner.
///
/// Called from the device's capture thread or callback.
pub trait DeviceDelegate: Send + Sync {
    /// The device reached the end of its input and will deliver no more audio.
    fn on_device_stopped(&self);

    /// A runtime error occurred on the capture side.
    fn on_device_error(&self, error: &StreamError);
}
