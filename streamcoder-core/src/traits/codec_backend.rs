use crate::models::audio_models::CodecKind;
use crate::models::error::StreamError;
use crate::traits::stream_sink::StreamSink;

/// Parameters handed to an encoder when the pipeline starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecSettings {
    pub channels: u16,
    /// Rate of the PCM handed to `encode_data`.
    pub samplerate: u32,
    /// kbit/s
    pub bitrate: u32,
    pub quality: f64,
}

/// A format-specific encoder driven by the codec pipeline.
pub trait CodecBackend: Send {
    fn kind(&self) -> CodecKind;

    fn is_available(&self) -> bool;

    /// Frames per encoder block. The pipeline only hands whole blocks to
    /// `encode_data`, except possibly the trailing block of a stream.
    fn pcm_frames(&self) -> usize;

    /// Bytes a listener needs before the first block, such as a container
    /// header. Empty when the format has none.
    fn stream_prologue(&self) -> Vec<u8>;

    fn start_codec(&mut self, settings: &CodecSettings) -> Result<(), StreamError>;

    /// Encodes `frames` frames of interleaved `pcm` and writes the result to
    /// `sink`.
    fn encode_data(&mut self, sink: &mut dyn StreamSink, pcm: &[f32], frames: usize) -> Result<(), StreamError>;

    fn content_type(&self) -> &'static str {
        self.kind().content_type()
    }

    fn default_extension(&self) -> &'static str {
        self.kind().default_extension()
    }
}
