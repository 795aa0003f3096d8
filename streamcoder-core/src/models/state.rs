use super::error::StreamError;
use super::session_result::SessionSummary;

/// Stream session state machine.
///
/// State transitions:
/// ```text
/// idle → ready → running → stopping → completed / failed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Ready,
    Running { duration_secs: f64 },
    Stopping,
    Completed(Box<SessionSummary>),
    Failed(StreamError),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    pub fn duration(&self) -> Option<f64> {
        match self {
            Self::Running { duration_secs } => Some(*duration_secs),
            Self::Completed(summary) => Some(summary.duration_secs),
            _ => None,
        }
    }
}

/// Codec pipeline lifecycle.
///
/// ```text
/// unconfigured → started → encoding → stopped
/// ```
/// Settings are only honoured while unconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    Unconfigured,
    Started,
    Encoding,
    Stopped,
}

impl CodecState {
    pub fn is_configurable(&self) -> bool {
        matches!(self, Self::Unconfigured)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Encoding)
    }
}
