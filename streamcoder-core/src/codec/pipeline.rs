//! Drains captured PCM from the ring buffer into an encoder backend.
//!
//! ```text
//! equal rates:    primary ring ──────────────────────────────────→ backend → sink
//! rates differ:   primary ring → staging → resampler → secondary ring → backend → sink
//! ```
//!
//! The pipeline only ever hands whole backend blocks to the encoder while the
//! stream runs; [`Codec::finish`] deals with the trailing partial block.

use crate::models::audio_models::CodecKind;
use crate::models::error::StreamError;
use crate::models::state::CodecState;
use crate::processing::resampler::LinearResampler;
use crate::processing::ring_buffer::{RingBuffer, RingReader};
use crate::traits::codec_backend::{CodecBackend, CodecSettings};
use crate::traits::stream_sink::StreamSink;

/// Minimum size of the secondary ring and of the resampler output staging,
/// relative to the primary ring and the input block.
pub const RESAMPLE_HEADROOM: usize = 6;

/// Buffers that only exist while the source and stream rates differ.
struct ResampleStage {
    resampler: LinearResampler,
    ring: RingBuffer,
    output: Vec<f32>,
}

pub struct Codec {
    backend: Box<dyn CodecBackend>,
    reader: RingReader,
    state: CodecState,
    channels: u16,
    bitrate: u32,
    quality: f64,
    source_samplerate: u32,
    stream_samplerate: u32,
    complete_frames: bool,
    block_frames: usize,
    pcm: Vec<f32>,
    resample: Option<ResampleStage>,
    prologue_sent: bool,
    frames_encoded: u64,
}

impl Codec {
    pub fn new(backend: Box<dyn CodecBackend>, reader: RingReader) -> Self {
        Self {
            block_frames: backend.pcm_frames(),
            backend,
            channels: reader.channels() as u16,
            reader,
            state: CodecState::Unconfigured,
            bitrate: 128,
            quality: 0.5,
            source_samplerate: 48000,
            stream_samplerate: 48000,
            complete_frames: false,
            pcm: Vec::new(),
            resample: None,
            prologue_sent: false,
            frames_encoded: 0,
        }
    }

    fn configurable(&self, setting: &str) -> bool {
        if !self.state.is_configurable() {
            log::warn!("ignoring {} change on a started codec", setting);
            return false;
        }
        true
    }

    pub fn set_channels(&mut self, channels: u16) {
        if self.configurable("channel") {
            self.channels = channels;
        }
    }

    pub fn set_bitrate(&mut self, kbps: u32) {
        if self.configurable("bitrate") {
            self.bitrate = kbps;
        }
    }

    pub fn set_quality(&mut self, quality: f64) {
        if self.configurable("quality") {
            self.quality = quality;
        }
    }

    pub fn set_source_samplerate(&mut self, rate: u32) {
        if self.configurable("source sample rate") {
            self.source_samplerate = rate;
        }
    }

    pub fn set_stream_samplerate(&mut self, rate: u32) {
        if self.configurable("stream sample rate") {
            self.stream_samplerate = rate;
        }
    }

    pub fn set_complete_frames(&mut self, complete: bool) {
        if self.configurable("complete frames") {
            self.complete_frames = complete;
        }
    }

    pub fn kind(&self) -> CodecKind {
        self.backend.kind()
    }

    pub fn content_type(&self) -> &'static str {
        self.backend.content_type()
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn source_samplerate(&self) -> u32 {
        self.source_samplerate
    }

    pub fn stream_samplerate(&self) -> u32 {
        self.stream_samplerate
    }

    pub fn complete_frames(&self) -> bool {
        self.complete_frames
    }

    pub fn is_resampling(&self) -> bool {
        self.resample.is_some()
    }

    /// Frames handed to the backend so far, at the stream rate.
    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    /// Allocates the resampling stage when the rates differ and starts the
    /// backend. On failure the codec stays unconfigured.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if !self.state.is_configurable() {
            return Err(StreamError::InvalidState("codec already started".into()));
        }
        let channels = self.channels as usize;
        if channels != self.reader.channels() {
            return Err(StreamError::ConfigurationFailed(format!(
                "codec has {} channels but the ring buffer carries {}",
                channels,
                self.reader.channels()
            )));
        }
        if self.source_samplerate == 0 || self.stream_samplerate == 0 {
            return Err(StreamError::ConfigurationFailed(
                "sample rates must be positive".into(),
            ));
        }

        let block = self.block_frames;
        if self.reader.usable_frames() < block {
            return Err(StreamError::ConfigurationFailed(format!(
                "ring buffer holds {} frames, less than one {}-frame block",
                self.reader.usable_frames(),
                block
            )));
        }
        let resample = if self.source_samplerate != self.stream_samplerate {
            let ratio = self.stream_samplerate as f64 / self.source_samplerate as f64;
            let resampler = LinearResampler::new(channels, ratio)?;
            let out_frames = resampler.max_output_frames(block).max(RESAMPLE_HEADROOM * block);
            // the secondary ring never holds more than a partial block plus
            // the output of one input block between drains
            let ring_bytes = (self.reader.size() * RESAMPLE_HEADROOM)
                .max((out_frames + block + 1) * channels * 4);
            Some(ResampleStage {
                resampler,
                ring: RingBuffer::new(ring_bytes, channels),
                output: vec![0.0; out_frames * channels],
            })
        } else {
            None
        };

        let settings = CodecSettings {
            channels: self.channels,
            samplerate: self.stream_samplerate,
            bitrate: self.bitrate,
            quality: self.quality,
        };
        self.backend.start_codec(&settings)?;

        self.pcm = vec![0.0; block * channels];
        self.resample = resample;
        self.state = CodecState::Started;
        log::info!(
            "{} codec started: {} channels, {} Hz source, {} Hz stream{}",
            self.kind(),
            self.channels,
            self.source_samplerate,
            self.stream_samplerate,
            if self.is_resampling() { ", resampling" } else { "" }
        );
        Ok(())
    }

    /// Encodes every whole block currently buffered. A no-op when less than a
    /// block is available or once the codec has stopped.
    pub fn encode(&mut self, sink: &mut dyn StreamSink) -> Result<(), StreamError> {
        match self.state {
            CodecState::Unconfigured => {
                return Err(StreamError::InvalidState("codec not started".into()))
            }
            CodecState::Stopped => return Ok(()),
            CodecState::Started | CodecState::Encoding => {}
        }
        loop {
            let fed = self.feed_resampler(self.block_frames);
            self.drain_blocks(sink)?;
            if !fed {
                return Ok(());
            }
        }
    }

    /// Encodes whatever is left, including a trailing partial block, and
    /// stops the codec. The partial block is padded with silence when
    /// complete frames were requested.
    pub fn finish(&mut self, sink: &mut dyn StreamSink) -> Result<(), StreamError> {
        if !self.state.is_active() {
            self.state = CodecState::Stopped;
            return Ok(());
        }
        self.encode(sink)?;

        // the primary ring now holds less than a block
        if self.feed_resampler(1) {
            self.drain_blocks(sink)?;
        }

        let channels = self.channels as usize;
        let frames = self.read_block(self.block_frames);
        if frames > 0 {
            let frames = if self.complete_frames {
                self.pcm[frames * channels..].iter_mut().for_each(|s| *s = 0.0);
                self.block_frames
            } else {
                frames
            };
            self.emit(sink, frames)?;
        }
        if !self.prologue_sent {
            self.send_prologue(sink)?;
        }

        self.state = CodecState::Stopped;
        log::info!("{} codec stopped after {} frames", self.kind(), self.frames_encoded);
        Ok(())
    }

    /// Moves one block of at least `min_frames` frames from the primary ring
    /// through the resampler. Returns `false` when there was nothing to move.
    fn feed_resampler(&mut self, min_frames: usize) -> bool {
        let Some(stage) = self.resample.as_mut() else {
            return false;
        };
        let available = self.reader.read_space();
        if available == 0 || available < min_frames {
            return false;
        }
        let channels = self.channels as usize;
        let frames = self.reader.read(&mut self.pcm, self.block_frames);
        match stage
            .resampler
            .process(&self.pcm[..frames * channels], &mut stage.output)
        {
            Ok(generated) => {
                let written = stage.ring.write(&stage.output, generated);
                if written < generated {
                    log::warn!(
                        "resampled stream overrun, dropped {} frames",
                        generated - written
                    );
                }
            }
            Err(e) => log::warn!("sample rate converter: {}", e),
        }
        true
    }

    fn drain_blocks(&mut self, sink: &mut dyn StreamSink) -> Result<(), StreamError> {
        while self.pending_frames() >= self.block_frames {
            let frames = self.read_block(self.block_frames);
            self.emit(sink, frames)?;
        }
        Ok(())
    }

    /// Frames waiting in the ring that feeds the backend.
    fn pending_frames(&self) -> usize {
        match self.resample {
            Some(ref stage) => stage.ring.read_space(),
            None => self.reader.read_space(),
        }
    }

    fn read_block(&mut self, frames: usize) -> usize {
        match self.resample {
            Some(ref mut stage) => stage.ring.read(&mut self.pcm, frames),
            None => self.reader.read(&mut self.pcm, frames),
        }
    }

    fn send_prologue(&mut self, sink: &mut dyn StreamSink) -> Result<(), StreamError> {
        let prologue = self.backend.stream_prologue();
        if !prologue.is_empty() {
            sink.write_data(0, &prologue)?;
        }
        self.prologue_sent = true;
        Ok(())
    }

    fn emit(&mut self, sink: &mut dyn StreamSink, frames: usize) -> Result<(), StreamError> {
        if !self.prologue_sent {
            self.send_prologue(sink)?;
        }
        let samples = frames * self.channels as usize;
        self.backend.encode_data(sink, &self.pcm[..samples], frames)?;
        self.frames_encoded += frames as u64;
        self.state = CodecState::Encoding;
        Ok(())
    }
}
