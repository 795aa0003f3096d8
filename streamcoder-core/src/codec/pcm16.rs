//! Uncompressed 16-bit PCM in WAV framing.
//!
//! The prologue is a WAV header with open-ended sizes, so a listener that
//! joins from the start can play the stream directly.

use crate::models::audio_models::CodecKind;
use crate::models::config::MAX_AUDIO_CHANNELS;
use crate::models::error::StreamError;
use crate::processing::convert::float_to_i16_le;
use crate::processing::wav_format::streaming_wav_header;
use crate::traits::codec_backend::{CodecBackend, CodecSettings};
use crate::traits::stream_sink::StreamSink;

/// Frames per block.
pub const PCM16_FRAMES: usize = 1024;

#[derive(Debug, Default)]
pub struct Pcm16Codec {
    settings: Option<CodecSettings>,
    header: Vec<u8>,
    encoded: Vec<u8>,
}

impl Pcm16Codec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodecBackend for Pcm16Codec {
    fn kind(&self) -> CodecKind {
        CodecKind::Pcm16
    }

    fn is_available(&self) -> bool {
        true
    }

    fn pcm_frames(&self) -> usize {
        PCM16_FRAMES
    }

    fn stream_prologue(&self) -> Vec<u8> {
        self.header.clone()
    }

    fn start_codec(&mut self, settings: &CodecSettings) -> Result<(), StreamError> {
        if settings.channels == 0 || settings.channels > MAX_AUDIO_CHANNELS {
            return Err(StreamError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                settings.channels
            )));
        }
        if settings.samplerate == 0 {
            return Err(StreamError::ConfigurationFailed(
                "sample rate must be positive".into(),
            ));
        }
        self.header = streaming_wav_header(settings.samplerate, 16, settings.channels)?.to_vec();
        self.encoded = Vec::with_capacity(PCM16_FRAMES * settings.channels as usize * 2);
        self.settings = Some(*settings);
        Ok(())
    }

    fn encode_data(&mut self, sink: &mut dyn StreamSink, pcm: &[f32], frames: usize) -> Result<(), StreamError> {
        let settings = self
            .settings
            .ok_or_else(|| StreamError::InvalidState("pcm16 codec not started".into()))?;
        let samples = (frames * settings.channels as usize).min(pcm.len());
        self.encoded.clear();
        float_to_i16_le(&pcm[..samples], &mut self.encoded);
        sink.write_data(frames as u64, &self.encoded)
    }
}
