//! Virtual device generating a sine test tone.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::context::{block_interval, spawn_ticker, CaptureContext, DEVICE_BLOCK_FRAMES};
use crate::models::audio_models::DeviceKind;
use crate::models::error::StreamError;
use crate::processing::meter::MeterBank;
use crate::processing::ring_buffer::RingWriter;
use crate::traits::audio_device::{option_key, AudioDevice};
use crate::traits::device_delegate::DeviceDelegate;

pub const DEFAULT_SIGNAL_FREQUENCY: f64 = 1000.0;

/// dBFS
pub const DEFAULT_SIGNAL_LEVEL: f64 = -16.0;

pub struct SignalDevice {
    channels: usize,
    samplerate: u32,
    frequency: f64,
    level_db: f64,
    duration_secs: Option<f64>,
    writer: Option<RingWriter>,
    meters: Arc<MeterBank>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    delegate: Option<Arc<dyn DeviceDelegate>>,
}

impl SignalDevice {
    pub fn new(channels: usize, samplerate: u32, writer: RingWriter) -> Self {
        Self {
            channels,
            samplerate,
            frequency: DEFAULT_SIGNAL_FREQUENCY,
            level_db: DEFAULT_SIGNAL_LEVEL,
            duration_secs: None,
            writer: Some(writer),
            meters: Arc::new(MeterBank::new(channels)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            delegate: None,
        }
    }

    pub fn available() -> bool {
        true
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn level_db(&self) -> f64 {
        self.level_db
    }
}

fn parse_option(key: &str, value: &str) -> Result<f64, StreamError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| StreamError::ConfigurationFailed(format!("invalid {} value \"{}\"", key, value)))
}

impl AudioDevice for SignalDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Signal
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
                "signal-frequency" => {
                    let frequency = parse_option(key, value)?;
                    if frequency <= 0.0 || frequency >= self.samplerate as f64 / 2.0 {
                        return Err(StreamError::ConfigurationFailed(format!(
                            "signal frequency {} Hz out of range",
                            frequency
                        )));
                    }
                    self.frequency = frequency;
                }
                "signal-level" => {
                    let level = parse_option(key, value)?;
                    if level > 0.0 {
                        return Err(StreamError::ConfigurationFailed(format!(
                            "signal level {} dBFS is above full scale",
                            level
                        )));
                    }
                    self.level_db = level;
                }
                "signal-duration" => {
                    let secs = parse_option(key, value)?;
                    if secs < 0.0 {
                        return Err(StreamError::ConfigurationFailed(format!(
                            "negative signal duration {}",
                            secs
                        )));
                    }
                    self.duration_secs = (secs > 0.0).then_some(secs);
                }
                _ => return Err(StreamError::UnsupportedOption(key.clone())),
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| StreamError::InvalidState("signal device already started".into()))?;
        let mut context = CaptureContext::new(writer, 1, Arc::clone(&self.meters))?;
        let mut tone = ToneGenerator::new(self.frequency, self.level_db, self.samplerate);
        let mut block = vec![0.0f32; DEVICE_BLOCK_FRAMES];
        let mut remaining = self
            .duration_secs
            .map(|secs| (secs * self.samplerate as f64).round() as u64);
        let delegate = self.delegate.clone();

        self.running.store(true, Ordering::Release);
        let handle = spawn_ticker(
            "signal-device",
            block_interval(self.samplerate),
            Arc::clone(&self.running),
            move || {
                let frames = match remaining {
                    Some(0) => {
                        log::info!("signal finished");
                        if let Some(ref delegate) = delegate {
                            delegate.on_device_stopped();
                        }
                        return false;
                    }
                    Some(left) => {
                        let frames = left.min(DEVICE_BLOCK_FRAMES as u64);
                        remaining = Some(left - frames);
                        frames as usize
                    }
                    None => DEVICE_BLOCK_FRAMES,
                };
                tone.fill(&mut block[..frames]);
                context.deliver(&block[..frames]);
                true
            },
        )?;
        self.handle = Some(handle);

        log::info!(
            "generating {} Hz tone at {} dBFS",
            self.frequency,
            self.level_db
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| StreamError::Unknown("signal device thread panicked".into()))?;
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

    fn set_delegate(&mut self, delegate: Arc<dyn DeviceDelegate>) {
        self.delegate = Some(delegate);
    }
}

impl Drop for SignalDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Phase-continuous sine oscillator.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    amplitude: f64,
    step: f64,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(frequency: f64, level_db: f64, samplerate: u32) -> Self {
        Self {
            amplitude: 10f64.powf(level_db / 20.0),
            step: TAU * frequency / samplerate.max(1) as f64,
            phase: 0.0,
        }
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = (self.amplitude * self.phase.sin()) as f32;
            self.phase = (self.phase + self.step) % TAU;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ring_buffer::RingBuffer;
    use approx::assert_abs_diff_eq;
    use std::time::{Duration, Instant};

    fn device() -> (SignalDevice, crate::processing::ring_buffer::RingReader) {
        let (writer, reader) = RingBuffer::new(65536, 2).split();
        (SignalDevice::new(2, 48000, writer), reader)
    }

    #[test]
    fn options_are_validated() {
        let (mut dev, _reader) = device();
        dev.process_options(&[
            ("signal-frequency".into(), "440".into()),
            ("--signal-level".into(), "-6".into()),
        ])
        .unwrap();
        assert_eq!(dev.frequency(), 440.0);
        assert_eq!(dev.level_db(), -6.0);

        assert!(dev.process_options(&[("signal-frequency".into(), "30000".into())]).is_err());
        assert!(dev.process_options(&[("signal-level".into(), "3".into())]).is_err());
        assert!(dev.process_options(&[("signal-level".into(), "loud".into())]).is_err());
        assert_eq!(
            dev.process_options(&[("file-name".into(), "x.wav".into())]),
            Err(StreamError::UnsupportedOption("file-name".into()))
        );
    }

    #[test]
    fn tone_has_requested_peak() {
        let mut tone = ToneGenerator::new(1000.0, -6.0, 48000);
        let mut block = [0.0f32; 480];
        tone.fill(&mut block);

        let peak = block.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert_abs_diff_eq!(peak, 0.501, epsilon = 0.002);
        assert_eq!(block[0], 0.0);
    }

    #[test]
    fn tone_is_continuous_across_blocks() {
        let mut split = ToneGenerator::new(440.0, 0.0, 44100);
        let mut whole = split.clone();
        let mut a = [0.0f32; 100];
        let mut b = [0.0f32; 100];
        let mut all = [0.0f32; 200];
        split.fill(&mut a);
        split.fill(&mut b);
        whole.fill(&mut all);

        for (x, y) in b.iter().zip(&all[100..]) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
        }
    }

    #[test]
    fn finite_signal_stops_itself() {
        struct Flag(AtomicBool);
        impl DeviceDelegate for Flag {
            fn on_device_stopped(&self) {
                self.0.store(true, Ordering::SeqCst);
            }
            fn on_device_error(&self, _error: &StreamError) {}
        }

        let (writer, reader) = RingBuffer::new(65536, 1).split();
        let mut dev = SignalDevice::new(1, 48000, writer);
        let flag = Arc::new(Flag(AtomicBool::new(false)));
        dev.set_delegate(flag.clone());
        dev.process_options(&[("signal-duration".into(), "0.05".into())]).unwrap();
        dev.start().unwrap();

        let start = Instant::now();
        while !flag.0.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        dev.stop().unwrap();

        assert!(flag.0.load(Ordering::SeqCst));
        assert_eq!(reader.read_space(), 2400);
    }

    #[test]
    fn delivers_stereo_tone_and_meters() {
        let (mut dev, reader) = device();
        dev.start().unwrap();
        assert!(matches!(dev.start(), Err(StreamError::InvalidState(_))));

        let start = Instant::now();
        while reader.read_space() < DEVICE_BLOCK_FRAMES && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        dev.stop().unwrap();

        assert!(reader.read_space() >= DEVICE_BLOCK_FRAMES);
        let mut frame = [0.0f32; 4];
        reader.peek(&mut frame, 2);
        assert_eq!(frame[2], frame[3]);
        // metered before stop, reset to silence after
        assert_eq!(dev.meter_levels(), vec![10_000, 10_000]);
    }
}
