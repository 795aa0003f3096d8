use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::CodecKind;

/// Result returned when a stream session stops.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Frames handed to the encoder backend, at the stream rate.
    pub frames_encoded: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
    /// SHA-256 of the output, when the sink can compute one.
    pub checksum: Option<String>,
    pub file_path: Option<PathBuf>,
    pub metadata: StreamMetadata,
}

/// Description of a finished stream, stored as a JSON sidecar next to file
/// output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub id: String,
    pub created_at: String,
    pub codec: CodecKind,
    pub content_type: String,
    pub channels: u16,
    pub source_sample_rate: u32,
    pub stream_sample_rate: u32,
    pub bitrate: u32,
    pub duration_secs: f64,
    pub bytes_written: u64,
    pub checksum: Option<String>,
    pub file_path: Option<String>,
}

impl StreamMetadata {
    pub fn new(
        codec: CodecKind,
        channels: u16,
        source_sample_rate: u32,
        stream_sample_rate: u32,
        bitrate: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            codec,
            content_type: codec.content_type().to_string(),
            channels,
            source_sample_rate,
            stream_sample_rate,
            bitrate,
            duration_secs: 0.0,
            bytes_written: 0,
            checksum: None,
            file_path: None,
        }
    }
}
