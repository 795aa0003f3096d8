//! Capture-side state shared by the device backends.
//!
//! A [`CaptureContext`] is built when a device starts and moved into the
//! thread or callback that delivers audio. It owns the producer half of the
//! ring buffer, so nothing on the capture path takes a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::models::error::StreamError;
use crate::processing::meter::{peak_levels, MeterAverage, MeterBank, METER_AVERAGE_DEPTH};
use crate::processing::remix::Remix;
use crate::processing::ring_buffer::RingWriter;

/// Frames delivered per tick by the timer-driven devices.
pub const DEVICE_BLOCK_FRAMES: usize = 1024;

pub struct CaptureContext {
    writer: RingWriter,
    remix: Remix,
    remixed: Vec<f32>,
    peaks: Vec<f32>,
    chunk_peaks: Vec<f32>,
    averages: Vec<MeterAverage>,
    meters: Arc<MeterBank>,
    overrun: bool,
}

impl CaptureContext {
    /// `device_channels` is the layout the backend produces; it is remixed to
    /// the ring buffer's layout on the way in.
    pub fn new(writer: RingWriter, device_channels: usize, meters: Arc<MeterBank>) -> Result<Self, StreamError> {
        let remix = Remix::new(device_channels, writer.channels())?;
        let channels = remix.channels_out();
        Ok(Self {
            writer,
            remix,
            remixed: vec![0.0; DEVICE_BLOCK_FRAMES * channels],
            peaks: vec![0.0; channels],
            chunk_peaks: vec![0.0; channels],
            averages: (0..channels)
                .map(|_| MeterAverage::new(METER_AVERAGE_DEPTH))
                .collect(),
            meters,
            overrun: false,
        })
    }

    pub fn device_channels(&self) -> usize {
        self.remix.channels_in()
    }

    /// Remixes, meters and queues interleaved device audio.
    ///
    /// Input longer than [`DEVICE_BLOCK_FRAMES`] is handled block by block,
    /// so a large host buffer never grows the scratch space. Returns the
    /// number of frames that fit in the ring buffer.
    pub fn deliver(&mut self, pcm: &[f32]) -> usize {
        let chans_in = self.remix.channels_in();
        let channels = self.remix.channels_out();
        self.peaks.iter_mut().for_each(|p| *p = 0.0);

        let mut queued = 0;
        for chunk in pcm.chunks(DEVICE_BLOCK_FRAMES * chans_in) {
            let frames = self.remix.apply(&mut self.remixed, chunk, chunk.len() / chans_in);
            peak_levels(&mut self.chunk_peaks, &self.remixed[..frames * channels], channels);
            for (peak, chunk_peak) in self.peaks.iter_mut().zip(&self.chunk_peaks) {
                *peak = peak.max(*chunk_peak);
            }
            queued += self.queue(frames);
        }

        for (peak, avg) in self.peaks.iter_mut().zip(self.averages.iter_mut()) {
            avg.add_value(*peak);
            *peak = avg.average();
        }
        self.meters.set_peaks(&self.peaks);
        queued
    }

    /// Queues `frames` frames of silence without touching the meters.
    pub fn deliver_silence(&mut self, frames: usize) -> usize {
        self.remixed.iter_mut().for_each(|s| *s = 0.0);
        let mut remaining = frames;
        let mut queued = 0;
        while remaining > 0 {
            let n = remaining.min(DEVICE_BLOCK_FRAMES);
            queued += self.queue(n);
            remaining -= n;
        }
        queued
    }

    fn queue(&mut self, frames: usize) -> usize {
        let written = self.writer.write(&self.remixed, frames);
        if written < frames {
            if !self.overrun {
                log::warn!(
                    "ring buffer overrun, dropped {} of {} frames",
                    frames - written,
                    frames
                );
            }
            self.overrun = true;
        } else {
            self.overrun = false;
        }
        written
    }
}

/// Tick period for delivering `DEVICE_BLOCK_FRAMES` frames at `samplerate`.
pub fn block_interval(samplerate: u32) -> Duration {
    Duration::from_micros(1_000_000 * DEVICE_BLOCK_FRAMES as u64 / samplerate.max(1) as u64)
}

/// Runs `tick` every `interval` on a named thread until `running` clears or
/// `tick` returns `false`. The first tick comes one interval after the spawn.
///
/// Late ticks are not made up; the schedule restarts from the late tick.
pub fn spawn_ticker<F>(
    name: &str,
    interval: Duration,
    running: Arc<AtomicBool>,
    mut tick: F,
) -> Result<JoinHandle<()>, StreamError>
where
    F: FnMut() -> bool + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let mut next = Instant::now();
            loop {
                next += interval;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    next = now;
                }
                if !running.load(Ordering::Acquire) {
                    break;
                }
                if !tick() {
                    running.store(false, Ordering::Release);
                    break;
                }
            }
        })
        .map_err(|e| StreamError::Unknown(format!("failed to spawn {} thread: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::meter::METER_SILENCE;
    use crate::processing::ring_buffer::RingBuffer;

    #[test]
    fn mono_device_fills_stereo_ring() {
        let (writer, mut reader) = RingBuffer::new(4096, 2).split();
        let meters = Arc::new(MeterBank::new(2));
        let mut ctx = CaptureContext::new(writer, 1, Arc::clone(&meters)).unwrap();

        assert_eq!(ctx.deliver(&[0.5, -0.25, 0.1]), 3);

        let mut out = [0.0; 6];
        assert_eq!(reader.read(&mut out, 3), 3);
        assert_eq!(out, [0.5, 0.5, -0.25, -0.25, 0.1, 0.1]);
        // 0.5 peak: -2000 * log10(0.5) ≈ 602
        assert_eq!(meters.levels(), vec![602, 602]);
    }

    #[test]
    fn unsupported_layout_is_a_configuration_error() {
        let (writer, _reader) = RingBuffer::new(4096, 2).split();
        let result = CaptureContext::new(writer, 4, Arc::new(MeterBank::new(2)));
        assert!(matches!(result, Err(StreamError::ConfigurationFailed(_))));
    }

    #[test]
    fn silence_leaves_meters_alone() {
        let (writer, mut reader) = RingBuffer::new(4096, 1).split();
        let meters = Arc::new(MeterBank::new(1));
        let mut ctx = CaptureContext::new(writer, 1, Arc::clone(&meters)).unwrap();

        assert_eq!(ctx.deliver_silence(16), 16);
        assert_eq!(reader.read_space(), 16);
        assert_eq!(meters.levels(), vec![METER_SILENCE]);
    }

    #[test]
    fn overrun_truncates_without_evicting() {
        // 64 bytes, 15 mono frames usable
        let (writer, mut reader) = RingBuffer::new(64, 1).split();
        let mut ctx = CaptureContext::new(writer, 1, Arc::new(MeterBank::new(1))).unwrap();

        let first: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        assert_eq!(ctx.deliver(&first), 10);
        assert_eq!(ctx.deliver(&[0.9; 10]), 5);

        let mut out = [0.0; 15];
        reader.read(&mut out, 15);
        assert_eq!(&out[..10], first.as_slice());
    }

    #[test]
    fn oversized_host_buffer_is_queued_in_blocks() {
        let (writer, mut reader) = RingBuffer::new(65536, 2).split();
        let meters = Arc::new(MeterBank::new(2));
        let mut ctx = CaptureContext::new(writer, 1, Arc::clone(&meters)).unwrap();

        let frames = DEVICE_BLOCK_FRAMES * 2 + 100;
        let mut pcm = vec![0.0f32; frames];
        pcm[frames - 1] = 0.5;
        assert_eq!(ctx.deliver(&pcm), frames);
        assert_eq!(ctx.remixed.len(), DEVICE_BLOCK_FRAMES * 2);

        let mut out = vec![0.0; frames * 2];
        assert_eq!(reader.read(&mut out, frames), frames);
        assert_eq!(&out[(frames - 1) * 2..], &[0.5, 0.5]);
        // the peak sits in the last, short block
        assert_eq!(meters.levels(), vec![602, 602]);

        assert_eq!(ctx.deliver_silence(DEVICE_BLOCK_FRAMES + 1), DEVICE_BLOCK_FRAMES + 1);
        assert_eq!(reader.read_space(), DEVICE_BLOCK_FRAMES + 1);
    }

    #[test]
    fn block_interval_matches_rate() {
        assert_eq!(block_interval(48000), Duration::from_micros(21_333));
        assert_eq!(block_interval(44100), Duration::from_micros(23_219));
    }
}
