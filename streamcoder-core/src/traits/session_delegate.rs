use crate::models::error::StreamError;
use crate::models::session_result::SessionSummary;
use crate::models::state::SessionState;

/// Event delegate for stream session notifications.
///
/// Methods may be called from the encode thread or a device thread.
/// Implementations should hand off to their own thread if they block.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &SessionState);

    /// Called when an error occurs while streaming.
    fn on_error(&self, error: &StreamError);

    /// Called when the device stops delivering audio on its own.
    fn on_device_stopped(&self) {}

    /// Called when the stream is finalized.
    fn on_session_finished(&self, summary: &SessionSummary);
}
