//! # streamcoder-core
//!
//! Live audio capture and streaming encoder core.
//!
//! A capture device writes interleaved `f32` PCM into a lock-free
//! single-producer/single-consumer ring buffer. A codec pipeline drains it on
//! a timer, resamples when the device rate differs from the stream rate, and
//! hands whole blocks to an encoder backend that writes to a sink.
//!
//! ## Architecture
//!
//! ```text
//! streamcoder-core (this crate)
//! ├── traits/       ← AudioDevice, DeviceDelegate, CodecBackend, StreamSink, SessionDelegate
//! ├── models/       ← StreamError, StreamConfiguration, SessionState, DeviceKind, CodecKind
//! ├── processing/   ← RingBuffer, LinearResampler, remix, metering, sample conversion, WAV framing
//! ├── device/       ← CaptureContext, FileDevice, SignalDevice, CpalDevice, factory
//! ├── codec/        ← Codec pipeline, Pcm16Codec, OpusCodec, UnavailableCodec, factory
//! ├── session/      ← StreamSession (device → ring → codec → sink)
//! └── storage/      ← FileSink, WriterSink, metadata sidecar
//! ```

pub mod codec;
pub mod device;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use codec::pipeline::Codec;
pub use codec::{backend_for, codec_is_available, create_backend};
pub use device::{create_device, device_is_available};
pub use models::audio_models::{CodecKind, DeviceKind};
pub use models::config::StreamConfiguration;
pub use models::error::StreamError;
pub use models::session_result::{SessionSummary, StreamMetadata};
pub use models::state::{CodecState, SessionState};
pub use processing::meter::{MeterAverage, METER_SILENCE};
pub use processing::ring_buffer::{RingBuffer, RingReader, RingWriter};
pub use session::stream::StreamSession;
pub use storage::file_sink::FileSink;
pub use storage::writer_sink::WriterSink;
pub use traits::audio_device::AudioDevice;
pub use traits::codec_backend::{CodecBackend, CodecSettings};
pub use traits::device_delegate::DeviceDelegate;
pub use traits::session_delegate::SessionDelegate;
pub use traits::stream_sink::StreamSink;
