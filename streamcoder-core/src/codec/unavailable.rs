//! Formats whose encoders are not part of this workspace.
//!
//! They are still listed and selectable, but report themselves unavailable
//! and refuse to start.

use crate::models::audio_models::CodecKind;
use crate::models::error::StreamError;
use crate::traits::codec_backend::{CodecBackend, CodecSettings};
use crate::traits::stream_sink::StreamSink;

#[derive(Debug, Clone, Copy)]
pub struct UnavailableCodec {
    kind: CodecKind,
}

impl UnavailableCodec {
    pub fn new(kind: CodecKind) -> Self {
        Self { kind }
    }

    fn refuse(&self) -> StreamError {
        StreamError::UnsupportedCodec(format!(
            "{} ({}) encoding is not available in this build",
            self.kind.keyword(),
            self.kind.description()
        ))
    }
}

impl CodecBackend for UnavailableCodec {
    fn kind(&self) -> CodecKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        false
    }

    fn pcm_frames(&self) -> usize {
        match self.kind {
            CodecKind::Aacp => 2048,
            CodecKind::Mp2 | CodecKind::Mp3 => 1152,
            CodecKind::Opus => 960,
            CodecKind::Vorbis | CodecKind::Pcm16 => 1024,
        }
    }

    fn stream_prologue(&self) -> Vec<u8> {
        Vec::new()
    }

    fn start_codec(&mut self, _settings: &CodecSettings) -> Result<(), StreamError> {
        Err(self.refuse())
    }

    fn encode_data(&mut self, _sink: &mut dyn StreamSink, _pcm: &[f32], _frames: usize) -> Result<(), StreamError> {
        Err(self.refuse())
    }
}
