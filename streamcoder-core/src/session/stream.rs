use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::codec::create_backend;
use crate::codec::pipeline::Codec;
use crate::device::{create_device, device_is_available};
use crate::models::config::StreamConfiguration;
use crate::models::error::StreamError;
use crate::models::session_result::{SessionSummary, StreamMetadata};
use crate::models::state::SessionState;
use crate::processing::meter::METER_SILENCE;
use crate::processing::ring_buffer::RingBuffer;
use crate::storage::metadata::write_metadata;
use crate::traits::audio_device::AudioDevice;
use crate::traits::device_delegate::DeviceDelegate;
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::stream_sink::StreamSink;

/// Mutable session state shared with the encode thread.
struct SharedState {
    state: SessionState,
    started_at: Option<Instant>,
}

/// What the encode thread hands back when it exits.
struct EncodeOutcome {
    codec: Codec,
    sink: Box<dyn StreamSink>,
    error: Option<StreamError>,
}

/// Routes device notifications into the session.
struct DeviceEvents {
    stopped: Arc<AtomicBool>,
    delegate: Option<Arc<dyn SessionDelegate>>,
}

impl DeviceDelegate for DeviceEvents {
    fn on_device_stopped(&self) {
        log::info!("audio device stopped");
        self.stopped.store(true, Ordering::Release);
        if let Some(ref delegate) = self.delegate {
            delegate.on_device_stopped();
        }
    }

    fn on_device_error(&self, error: &StreamError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}

/// Captures from one device, encodes with one codec and writes to one sink.
///
/// ```text
/// [AudioDevice] → RingWriter ═ ring ═ RingReader → [Codec] → [StreamSink]
///  device thread                       encode thread (every encode_interval_ms)
/// ```
///
/// Transitions: `idle → ready` (`configure`), `ready → running` (`start`),
/// `running → stopping → completed | failed` (`stop`).
pub struct StreamSession {
    config: StreamConfiguration,
    device: Option<Box<dyn AudioDevice>>,
    codec: Option<Codec>,
    sink: Option<Box<dyn StreamSink>>,
    shared: Arc<Mutex<SharedState>>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    device_stopped: Arc<AtomicBool>,
    encode_running: Arc<AtomicBool>,
    encode_handle: Option<thread::JoinHandle<EncodeOutcome>>,
    source_samplerate: u32,
}

impl StreamSession {
    pub fn new(config: StreamConfiguration, sink: Box<dyn StreamSink>) -> Self {
        Self {
            config,
            device: None,
            codec: None,
            sink: Some(sink),
            shared: Arc::new(Mutex::new(SharedState {
                state: SessionState::Idle,
                started_at: None,
            })),
            delegate: None,
            device_stopped: Arc::new(AtomicBool::new(false)),
            encode_running: Arc::new(AtomicBool::new(false)),
            encode_handle: None,
            source_samplerate: 0,
        }
    }

    /// Must be set before `configure` to receive device notifications.
    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &StreamConfiguration {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        let shared = self.shared.lock();
        match (&shared.state, shared.started_at) {
            (SessionState::Running { .. }, Some(start)) => SessionState::Running {
                duration_secs: start.elapsed().as_secs_f64(),
            },
            (state, _) => state.clone(),
        }
    }

    /// Current device meter levels, one per stream channel.
    pub fn levels(&self) -> Vec<i32> {
        match self.device {
            Some(ref device) => device.meter_levels(),
            None => vec![METER_SILENCE; self.config.channels as usize],
        }
    }

    /// Whether the device ran out of input (end of file, finite signal).
    pub fn has_device_stopped(&self) -> bool {
        self.device_stopped.load(Ordering::Acquire)
    }

    /// Rate the device actually delivers, known once running.
    pub fn source_samplerate(&self) -> u32 {
        self.source_samplerate
    }

    /// Builds the ring buffer, device and codec. Transitions: idle → ready.
    pub fn configure(&mut self) -> Result<(), StreamError> {
        if !self.shared.lock().state.is_idle() {
            return Err(StreamError::InvalidState(
                "can only configure from idle state".into(),
            ));
        }
        self.config.validate()?;

        let kind = self.config.device;
        if !device_is_available(kind) {
            return Err(StreamError::DeviceNotAvailable(format!(
                "{} device is not available",
                kind
            )));
        }
        let backend = create_backend(self.config.codec)?;

        let channels = self.config.channels as usize;
        let (writer, reader) = RingBuffer::new(self.config.ring_buffer_bytes, channels).split();

        let mut device = create_device(kind, channels, self.config.sample_rate, writer);
        device.process_options(&self.config.device_option_pairs())?;
        device.set_delegate(Arc::new(DeviceEvents {
            stopped: Arc::clone(&self.device_stopped),
            delegate: self.delegate.clone(),
        }));

        let mut codec = Codec::new(backend, reader);
        codec.set_channels(self.config.channels);
        codec.set_bitrate(self.config.bitrate);
        codec.set_quality(self.config.quality);
        codec.set_stream_samplerate(self.config.sample_rate);
        codec.set_complete_frames(self.config.complete_frames);

        self.device = Some(device);
        self.codec = Some(codec);
        self.set_state(SessionState::Ready);
        log::info!(
            "configured {} device → {} codec, {} channels at {} Hz",
            kind,
            self.config.codec,
            self.config.channels,
            self.config.sample_rate
        );
        Ok(())
    }

    /// Starts the device and the encode thread. Transitions: ready → running.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if !matches!(self.shared.lock().state, SessionState::Ready) {
            return Err(StreamError::InvalidState(
                "can only start from ready state".into(),
            ));
        }
        let (Some(device), Some(mut codec), Some(sink)) =
            (self.device.as_mut(), self.codec.take(), self.sink.take())
        else {
            return Err(StreamError::InvalidState("session is not configured".into()));
        };

        if let Err(e) = device.start() {
            self.fail(e.clone());
            return Err(e);
        }
        self.source_samplerate = device.device_samplerate();
        codec.set_source_samplerate(self.source_samplerate);
        if let Err(e) = codec.start() {
            let _ = device.stop();
            self.fail(e.clone());
            return Err(e);
        }
        device.unmute();

        self.encode_running.store(true, Ordering::Release);
        let running = Arc::clone(&self.encode_running);
        let delegate = self.delegate.clone();
        let interval = Duration::from_millis(self.config.encode_interval_ms);
        let spawned = thread::Builder::new()
            .name("stream-encode".into())
            .spawn(move || encode_loop(codec, sink, running, interval, delegate));
        match spawned {
            Ok(handle) => self.encode_handle = Some(handle),
            Err(e) => {
                let _ = device.stop();
                let err = StreamError::Unknown(format!("failed to spawn encode thread: {}", e));
                self.fail(err.clone());
                return Err(err);
            }
        }

        self.shared.lock().started_at = Some(Instant::now());
        self.set_state(SessionState::Running { duration_secs: 0.0 });
        Ok(())
    }

    /// Stops the device, flushes the codec and closes the sink.
    /// Transitions: running → stopping → completed / failed.
    pub fn stop(&mut self) -> Result<SessionSummary, StreamError> {
        if !self.shared.lock().state.is_running() {
            return Err(StreamError::InvalidState(
                "can only stop a running session".into(),
            ));
        }
        self.set_state(SessionState::Stopping);

        if let Some(ref mut device) = self.device {
            if let Err(e) = device.stop() {
                log::warn!("device did not stop cleanly: {}", e);
            }
        }

        let result = self.finalize();
        match result {
            Ok(ref summary) => {
                self.set_state(SessionState::Completed(Box::new(summary.clone())));
                if let Some(ref delegate) = self.delegate {
                    delegate.on_session_finished(summary);
                }
            }
            Err(ref e) => self.fail(e.clone()),
        }
        result
    }

    fn finalize(&mut self) -> Result<SessionSummary, StreamError> {
        self.encode_running.store(false, Ordering::Release);
        let handle = self
            .encode_handle
            .take()
            .ok_or_else(|| StreamError::InvalidState("encode thread not running".into()))?;
        let EncodeOutcome {
            mut codec,
            mut sink,
            error,
        } = handle
            .join()
            .map_err(|_| StreamError::Unknown("encode thread panicked".into()))?;
        if let Some(e) = error {
            let _ = sink.close();
            return Err(e);
        }

        codec.finish(sink.as_mut())?;
        let checksum = sink.close()?;

        let stream_rate = codec.stream_samplerate();
        let frames_encoded = codec.frames_encoded();
        let duration_secs = frames_encoded as f64 / stream_rate as f64;
        let file_path = sink.file_path().map(|p| p.to_path_buf());

        let mut metadata = StreamMetadata::new(
            codec.kind(),
            codec.channels(),
            codec.source_samplerate(),
            stream_rate,
            codec.bitrate(),
        );
        metadata.duration_secs = duration_secs;
        metadata.bytes_written = sink.bytes_written();
        metadata.checksum = checksum.clone();
        metadata.file_path = file_path.as_ref().map(|p| p.to_string_lossy().into_owned());
        if let Some(ref path) = file_path {
            write_metadata(&metadata, path)?;
        }

        log::info!(
            "stream finished: {} frames, {} bytes, {:.2} s",
            frames_encoded,
            metadata.bytes_written,
            duration_secs
        );

        Ok(SessionSummary {
            frames_encoded,
            bytes_written: metadata.bytes_written,
            duration_secs,
            checksum,
            file_path,
            metadata,
        })
    }

    fn fail(&self, error: StreamError) {
        log::error!("stream session failed: {}", error);
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
        self.set_state(SessionState::Failed(error));
    }

    fn set_state(&self, new_state: SessionState) {
        self.shared.lock().state = new_state.clone();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.encode_handle.is_some() {
            if let Some(ref mut device) = self.device {
                let _ = device.stop();
            }
            self.encode_running.store(false, Ordering::Release);
            if let Some(handle) = self.encode_handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn encode_loop(
    mut codec: Codec,
    mut sink: Box<dyn StreamSink>,
    running: Arc<AtomicBool>,
    interval: Duration,
    delegate: Option<Arc<dyn SessionDelegate>>,
) -> EncodeOutcome {
    let mut error = None;
    while running.load(Ordering::Acquire) {
        thread::sleep(interval);
        if let Err(e) = codec.encode(sink.as_mut()) {
            log::error!("encoding failed: {}", e);
            if let Some(ref d) = delegate {
                d.on_error(&e);
            }
            error = Some(e);
            break;
        }
    }
    EncodeOutcome { codec, sink, error }
}
