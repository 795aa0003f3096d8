//! Opus in an Ogg stream.
//!
//! Only built with the `opus` cargo feature. Without it the codec still
//! exists so it can be listed, but reports itself unavailable.
//!
//! The prologue carries the `OpusHead` and `OpusTags` pages; every encoded
//! packet then goes out as a page of its own, so a listener can start
//! decoding at any page boundary after the headers.

use crate::models::audio_models::CodecKind;
use crate::models::error::StreamError;
use crate::traits::codec_backend::{CodecBackend, CodecSettings};
use crate::traits::stream_sink::StreamSink;

/// Frames per packet, 20 ms at 48 kHz.
pub const OPUS_FRAMES: usize = 960;

/// Opus streams are always encoded at 48 kHz; the pipeline resamples.
pub const OPUS_SAMPLERATE: u32 = 48000;

#[cfg_attr(not(feature = "opus"), allow(dead_code))]
const MAX_PACKET_BYTES: usize = 4000;

#[cfg_attr(not(feature = "opus"), allow(dead_code))]
const VENDOR: &str = concat!("streamcoder ", env!("CARGO_PKG_VERSION"));

/// Identification header, RFC 7845 section 5.1, channel mapping family 0.
#[cfg_attr(not(feature = "opus"), allow(dead_code))]
fn opus_head(channels: u8, pre_skip: u16, input_rate: u32) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1);
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&input_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes());
    head.push(0);
    head
}

/// Comment header with the vendor string and no user comments.
#[cfg_attr(not(feature = "opus"), allow(dead_code))]
fn opus_tags() -> Vec<u8> {
    let mut tags = Vec::with_capacity(16 + VENDOR.len());
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    tags.extend_from_slice(VENDOR.as_bytes());
    tags.extend_from_slice(&0u32.to_le_bytes());
    tags
}

#[cfg(feature = "opus")]
struct OggOpusStream {
    encoder: opus::Encoder,
    pages: ogg::writing::PacketWriter<'static, Vec<u8>>,
    serial: u32,
    channels: usize,
    pre_skip: u64,
    granule: u64,
    pcm: Vec<f32>,
    packet: Vec<u8>,
}

#[cfg(feature = "opus")]
fn codec_error(e: opus::Error) -> StreamError {
    StreamError::EncodingFailed(format!("opus: {}", e))
}

#[cfg(feature = "opus")]
fn page_error(e: std::io::Error) -> StreamError {
    StreamError::EncodingFailed(format!("ogg: {}", e))
}

#[derive(Default)]
pub struct OpusCodec {
    prologue: Vec<u8>,
    #[cfg(feature = "opus")]
    stream: Option<OggOpusStream>,
}

impl OpusCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available() -> bool {
        cfg!(feature = "opus")
    }

    #[cfg(feature = "opus")]
    fn open(&mut self, settings: &CodecSettings) -> Result<(), StreamError> {
        use ogg::writing::{PacketWriteEndInfo, PacketWriter};

        if settings.samplerate != OPUS_SAMPLERATE {
            return Err(StreamError::ConfigurationFailed(format!(
                "opus streams run at {} Hz, got {}",
                OPUS_SAMPLERATE, settings.samplerate
            )));
        }
        let layout = match settings.channels {
            1 => opus::Channels::Mono,
            2 => opus::Channels::Stereo,
            n => {
                return Err(StreamError::ConfigurationFailed(format!(
                    "unsupported channel count: {}",
                    n
                )))
            }
        };

        let mut encoder =
            opus::Encoder::new(OPUS_SAMPLERATE, layout, opus::Application::Audio).map_err(codec_error)?;
        if settings.bitrate == 0 {
            encoder.set_vbr(true).map_err(codec_error)?;
            encoder.set_bitrate(opus::Bitrate::Auto).map_err(codec_error)?;
        } else {
            let bits = i32::try_from(settings.bitrate.saturating_mul(1000)).map_err(|_| {
                StreamError::ConfigurationFailed(format!("bitrate {} kbps out of range", settings.bitrate))
            })?;
            encoder.set_vbr(false).map_err(codec_error)?;
            encoder.set_bitrate(opus::Bitrate::Bits(bits)).map_err(codec_error)?;
        }
        let pre_skip = u16::try_from(encoder.get_lookahead().map_err(codec_error)?).unwrap_or(0);

        let serial = uuid::Uuid::new_v4().as_u128() as u32;
        let mut pages = PacketWriter::new(Vec::new());
        pages
            .write_packet(
                opus_head(settings.channels as u8, pre_skip, settings.samplerate),
                serial,
                PacketWriteEndInfo::EndPage,
                0,
            )
            .map_err(page_error)?;
        pages
            .write_packet(opus_tags(), serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(page_error)?;
        self.prologue = std::mem::take(pages.inner_mut());

        let channels = settings.channels as usize;
        self.stream = Some(OggOpusStream {
            encoder,
            pages,
            serial,
            channels,
            pre_skip: pre_skip as u64,
            granule: 0,
            pcm: vec![0.0; OPUS_FRAMES * channels],
            packet: vec![0; MAX_PACKET_BYTES],
        });
        log::debug!("opus stream {:08x}, pre-skip {}", serial, pre_skip);
        Ok(())
    }

    #[cfg(not(feature = "opus"))]
    fn open(&mut self, _settings: &CodecSettings) -> Result<(), StreamError> {
        Err(StreamError::UnsupportedCodec(
            "built without opus support".into(),
        ))
    }

    /// Encodes one packet, padding a short trailing block with silence, and
    /// returns the page that carries it.
    #[cfg(feature = "opus")]
    fn encode_page(&mut self, pcm: &[f32], frames: usize) -> Result<Option<Vec<u8>>, StreamError> {
        use ogg::writing::PacketWriteEndInfo;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| StreamError::InvalidState("opus codec not started".into()))?;
        let frames = frames.min(OPUS_FRAMES);
        let samples = (frames * stream.channels).min(pcm.len());
        stream.pcm[..samples].copy_from_slice(&pcm[..samples]);
        stream.pcm[samples..].iter_mut().for_each(|s| *s = 0.0);

        let len = match stream.encoder.encode_float(&stream.pcm, &mut stream.packet) {
            Ok(len) => len,
            Err(e) => {
                log::warn!("opus encoding error: {}", e);
                return Ok(None);
            }
        };
        stream.granule += frames as u64;
        stream
            .pages
            .write_packet(
                stream.packet[..len].to_vec(),
                stream.serial,
                PacketWriteEndInfo::EndPage,
                stream.pre_skip + stream.granule,
            )
            .map_err(page_error)?;
        Ok(Some(std::mem::take(stream.pages.inner_mut())))
    }

    #[cfg(not(feature = "opus"))]
    fn encode_page(&mut self, _pcm: &[f32], _frames: usize) -> Result<Option<Vec<u8>>, StreamError> {
        Err(StreamError::InvalidState("opus codec not started".into()))
    }
}

impl CodecBackend for OpusCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Opus
    }

    fn is_available(&self) -> bool {
        Self::available()
    }

    fn pcm_frames(&self) -> usize {
        OPUS_FRAMES
    }

    fn stream_prologue(&self) -> Vec<u8> {
        self.prologue.clone()
    }

    fn start_codec(&mut self, settings: &CodecSettings) -> Result<(), StreamError> {
        self.open(settings)
    }

    fn encode_data(&mut self, sink: &mut dyn StreamSink, pcm: &[f32], frames: usize) -> Result<(), StreamError> {
        match self.encode_page(pcm, frames)? {
            Some(page) => sink.write_data(frames as u64, &page),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(samplerate: u32) -> CodecSettings {
        CodecSettings {
            channels: 2,
            samplerate,
            bitrate: 96,
            quality: 0.5,
        }
    }

    #[test]
    fn identification_header_layout() {
        let head = opus_head(2, 312, 44100);
        assert_eq!(head.len(), 19);
        assert_eq!(&head[..8], b"OpusHead");
        assert_eq!(head[8], 1);
        assert_eq!(head[9], 2);
        assert_eq!(u16::from_le_bytes([head[10], head[11]]), 312);
        assert_eq!(u32::from_le_bytes([head[12], head[13], head[14], head[15]]), 44100);
        assert_eq!(head[18], 0);

        let tags = opus_tags();
        assert_eq!(&tags[..8], b"OpusTags");
        assert_eq!(tags.len(), 16 + VENDOR.len());
    }

    #[cfg(not(feature = "opus"))]
    #[test]
    fn unavailable_without_feature() {
        let mut codec = OpusCodec::new();
        assert!(!codec.is_available());
        assert!(matches!(
            codec.start_codec(&settings(48000)),
            Err(StreamError::UnsupportedCodec(_))
        ));
    }

    #[cfg(feature = "opus")]
    #[test]
    fn only_48khz_streams() {
        let mut codec = OpusCodec::new();
        assert!(matches!(
            codec.start_codec(&settings(44100)),
            Err(StreamError::ConfigurationFailed(_))
        ));
        assert!(codec.stream_prologue().is_empty());
    }

    #[cfg(feature = "opus")]
    #[test]
    fn pipeline_emits_ogg_pages() {
        use crate::codec::pipeline::Codec;
        use crate::processing::ring_buffer::RingBuffer;
        use crate::storage::writer_sink::WriterSink;

        let (mut writer, reader) = RingBuffer::new(65536, 2).split();
        let mut codec = Codec::new(Box::new(OpusCodec::new()), reader);
        codec.set_bitrate(96);
        codec.start().unwrap();

        let frames = OPUS_FRAMES * 3;
        let tone: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (i as f32 * 0.05).sin() * 0.5;
                [s, s]
            })
            .collect();
        assert_eq!(writer.write(&tone, frames), frames);

        let mut sink = WriterSink::new(Vec::new());
        codec.encode(&mut sink).unwrap();
        codec.finish(&mut sink).unwrap();
        assert_eq!(codec.frames_encoded(), frames as u64);

        let out = sink.into_inner();
        assert_eq!(&out[..4], b"OggS");
        // 27-byte page header plus a single lacing value
        assert_eq!(&out[28..36], b"OpusHead");
        let pages = out.windows(4).filter(|w| *w == b"OggS").count();
        assert!(pages >= 5, "{} pages", pages);
    }
}
