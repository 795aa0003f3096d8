//! WAV file playback paced in real time.
//!
//! The file is read one block per tick on its own thread, so a file source
//! behaves like a live input. The device starts muted, writing silence, until
//! the session unmutes it; at end of file it notifies its delegate.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use hound::{SampleFormat, WavReader};

use super::context::{block_interval, spawn_ticker, CaptureContext, DEVICE_BLOCK_FRAMES};
use crate::models::audio_models::DeviceKind;
use crate::models::config::MAX_AUDIO_CHANNELS;
use crate::models::error::StreamError;
use crate::processing::convert::int_to_float;
use crate::processing::meter::MeterBank;
use crate::processing::ring_buffer::RingWriter;
use crate::traits::audio_device::{option_key, AudioDevice};
use crate::traits::device_delegate::DeviceDelegate;

pub struct FileDevice {
    channels: usize,
    samplerate: u32,
    file_name: Option<PathBuf>,
    writer: Option<RingWriter>,
    meters: Arc<MeterBank>,
    muted: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    delegate: Option<Arc<dyn DeviceDelegate>>,
}

impl FileDevice {
    pub fn new(channels: usize, samplerate: u32, writer: RingWriter) -> Self {
        Self {
            channels,
            samplerate,
            file_name: None,
            writer: Some(writer),
            meters: Arc::new(MeterBank::new(channels)),
            muted: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            delegate: None,
        }
    }

    pub fn available() -> bool {
        true
    }
}

impl AudioDevice for FileDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::File
    }

    fn is_available(&self) -> bool {
        Self::available()
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn process_options(&mut self, options: &[(String, String)]) -> Result<(), StreamError> {
        for (key, value) in options {
            match option_key(key) {
                "file-name" => self.file_name = Some(PathBuf::from(value)),
                _ => return Err(StreamError::UnsupportedOption(key.clone())),
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        if self.writer.is_none() {
            return Err(StreamError::InvalidState("file device already started".into()));
        }
        let file_name = self
            .file_name
            .clone()
            .ok_or_else(|| StreamError::ConfigurationFailed("no file name given".into()))?;

        let reader = WavReader::open(&file_name).map_err(|e| {
            StreamError::DeviceNotAvailable(format!("{}: {}", file_name.display(), e))
        })?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.channels > MAX_AUDIO_CHANNELS {
            return Err(StreamError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                spec.channels
            )));
        }
        let writer = self
            .writer
            .take()
            .ok_or_else(|| StreamError::InvalidState("file device already started".into()))?;
        let context = CaptureContext::new(writer, spec.channels as usize, Arc::clone(&self.meters))?;
        self.samplerate = spec.sample_rate;

        let mut player = FilePlayer {
            reader,
            context,
            pcm: Vec::with_capacity(DEVICE_BLOCK_FRAMES * spec.channels as usize),
            ints: Vec::new(),
            muted: Arc::clone(&self.muted),
            delegate: self.delegate.clone(),
        };

        self.running.store(true, Ordering::Release);
        let handle = spawn_ticker(
            "file-device",
            block_interval(spec.sample_rate),
            Arc::clone(&self.running),
            move || player.tick(),
        )?;
        self.handle = Some(handle);

        log::info!(
            "playing {} ({} Hz, {} channels, {:?})",
            file_name.display(),
            spec.sample_rate,
            spec.channels,
            spec.sample_format
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| StreamError::Unknown("file device thread panicked".into()))?;
        }
        self.meters.silence();
        Ok(())
    }

    fn device_samplerate(&self) -> u32 {
        self.samplerate
    }

    fn meter_levels(&self) -> Vec<i32> {
        self.meters.levels()
    }

    fn unmute(&mut self) {
        self.muted.store(false, Ordering::Release);
    }

    fn set_delegate(&mut self, delegate: Arc<dyn DeviceDelegate>) {
        self.delegate = Some(delegate);
    }
}

impl Drop for FileDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// State owned by the playback thread.
struct FilePlayer {
    reader: WavReader<BufReader<File>>,
    context: CaptureContext,
    pcm: Vec<f32>,
    ints: Vec<i32>,
    muted: Arc<AtomicBool>,
    delegate: Option<Arc<dyn DeviceDelegate>>,
}

impl FilePlayer {
    /// Delivers one block. Returns `false` once the file is exhausted.
    fn tick(&mut self) -> bool {
        if self.muted.load(Ordering::Acquire) {
            self.context.deliver_silence(DEVICE_BLOCK_FRAMES);
            return true;
        }

        if let Err(e) = self.read_block() {
            let err = StreamError::DeviceNotAvailable(format!("file read failed: {}", e));
            log::error!("{}", err);
            if let Some(ref delegate) = self.delegate {
                delegate.on_device_error(&err);
            }
            return false;
        }
        if self.pcm.is_empty() {
            log::info!("end of file reached");
            if let Some(ref delegate) = self.delegate {
                delegate.on_device_stopped();
            }
            return false;
        }

        self.context.deliver(&self.pcm);
        true
    }

    fn read_block(&mut self) -> Result<(), hound::Error> {
        let spec = self.reader.spec();
        let wanted = DEVICE_BLOCK_FRAMES * self.context.device_channels();
        self.pcm.clear();
        match spec.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    self.pcm.push(sample?);
                }
            }
            SampleFormat::Int => {
                self.ints.clear();
                for sample in self.reader.samples::<i32>().take(wanted) {
                    self.ints.push(sample?);
                }
                self.pcm.resize(self.ints.len(), 0.0);
                int_to_float(&self.ints, spec.bits_per_sample, &mut self.pcm);
            }
        }
        // a torn trailing frame is dropped
        let whole = self.pcm.len() - self.pcm.len() % self.context.device_channels();
        self.pcm.truncate(whole);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    use crate::processing::ring_buffer::RingBuffer;

    struct CountingDelegate {
        stopped: AtomicUsize,
    }

    impl DeviceDelegate for CountingDelegate {
        fn on_device_stopped(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_device_error(&self, _error: &StreamError) {}
    }

    fn temp_wav(name: &str, channels: u16, frames: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!("streamcoder_file_{}_{}.wav", name, uuid::Uuid::new_v4()));
        let spec = hound::WavSpec {
            channels,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames * channels as usize {
            writer.write_sample(((i % 100) as i16) * 100).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    fn options(path: &Path) -> Vec<(String, String)> {
        vec![("--file-name".to_string(), path.display().to_string())]
    }

    #[test]
    fn rejects_unknown_option() {
        let (writer, _reader) = RingBuffer::new(4096, 2).split();
        let mut device = FileDevice::new(2, 48000, writer);
        let err = device
            .process_options(&[("loop".to_string(), "1".to_string())])
            .unwrap_err();
        assert_eq!(err, StreamError::UnsupportedOption("loop".into()));
    }

    #[test]
    fn start_without_file_name_fails() {
        let (writer, _reader) = RingBuffer::new(4096, 2).split();
        let mut device = FileDevice::new(2, 48000, writer);
        assert!(matches!(device.start(), Err(StreamError::ConfigurationFailed(_))));
    }

    #[test]
    fn rejects_more_than_two_channels() {
        let path = temp_wav("surround", 4, 16);
        let (writer, _reader) = RingBuffer::new(4096, 2).split();
        let mut device = FileDevice::new(2, 48000, writer);
        device.process_options(&options(&path)).unwrap();

        assert!(matches!(device.start(), Err(StreamError::ConfigurationFailed(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn plays_whole_file_then_reports_stop() {
        let path = temp_wav("mono", 1, 3000);
        let (writer, mut reader) = RingBuffer::new(65536, 2).split();
        let mut device = FileDevice::new(2, 44100, writer);
        let delegate = Arc::new(CountingDelegate {
            stopped: AtomicUsize::new(0),
        });
        device.set_delegate(delegate.clone());
        device.process_options(&options(&path)).unwrap();

        device.unmute();
        device.start().unwrap();
        assert_eq!(device.device_samplerate(), 48000);
        assert!(matches!(device.start(), Err(StreamError::InvalidState(_))));

        assert!(wait_for(Duration::from_secs(5), || {
            delegate.stopped.load(Ordering::SeqCst) == 1
        }));
        device.stop().unwrap();

        assert_eq!(reader.read_space(), 3000);
        let mut out = vec![0.0; 6];
        reader.read(&mut out, 3);
        // 16-bit 100 → 100 / 32768, duplicated to both channels
        let expected = 100.0 / 32768.0;
        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], expected);
        assert_eq!(out[3], expected);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn muted_device_writes_silence() {
        let path = temp_wav("muted", 2, 4096);
        let (writer, mut reader) = RingBuffer::new(65536, 2).split();
        let mut device = FileDevice::new(2, 48000, writer);
        device.process_options(&options(&path)).unwrap();
        device.start().unwrap();

        assert!(wait_for(Duration::from_secs(5), || reader.read_space() >= DEVICE_BLOCK_FRAMES));
        device.stop().unwrap();

        let mut out = vec![1.0; DEVICE_BLOCK_FRAMES * 2];
        reader.read(&mut out, DEVICE_BLOCK_FRAMES);
        assert!(out.iter().all(|&s| s == 0.0));
        std::fs::remove_file(&path).unwrap();
    }
}
