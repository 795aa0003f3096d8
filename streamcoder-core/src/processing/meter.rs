use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};

/// Meter reading for digital silence.
pub const METER_SILENCE: i32 = 10_000;

/// Window depth used by the capture devices.
pub const METER_AVERAGE_DEPTH: usize = 8;

/// Moving average over the last `max_size` values.
#[derive(Debug, Clone)]
pub struct MeterAverage {
    values: VecDeque<f32>,
    max_size: usize,
    total: f32,
}

impl MeterAverage {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            values: VecDeque::with_capacity(max_size + 1),
            max_size,
            total: 0.0,
        }
    }

    pub fn add_value(&mut self, value: f32) {
        self.total += value;
        self.values.push_back(value);
        while self.values.len() > self.max_size {
            if let Some(oldest) = self.values.pop_front() {
                self.total -= oldest;
            }
        }
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.total / self.values.len() as f32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Converts a linear peak (0.0–1.0) to a meter level in hundredths of a dB
/// below full scale: 1.0 → 0, 0.0 → [`METER_SILENCE`].
pub fn level_from_peak(peak: f32) -> i32 {
    if peak <= 0.0 {
        return METER_SILENCE;
    }
    let level = -2000.0 * peak.log10();
    level.round().clamp(0.0, METER_SILENCE as f32) as i32
}

/// Per-channel absolute peaks of interleaved `pcm`, written into `peaks`.
pub fn peak_levels(peaks: &mut [f32], pcm: &[f32], channels: usize) {
    peaks.iter_mut().for_each(|p| *p = 0.0);
    if channels == 0 {
        return;
    }
    for frame in pcm.chunks_exact(channels) {
        for (peak, sample) in peaks.iter_mut().zip(frame) {
            *peak = peak.max(sample.abs());
        }
    }
}

/// Meter levels published by a capture context and polled by its owner.
///
/// One atomic per channel, so the realtime side never takes a lock.
#[derive(Debug)]
pub struct MeterBank {
    levels: Box<[AtomicI32]>,
}

impl MeterBank {
    pub fn new(channels: usize) -> Self {
        Self {
            levels: (0..channels).map(|_| AtomicI32::new(METER_SILENCE)).collect(),
        }
    }

    pub fn channels(&self) -> usize {
        self.levels.len()
    }

    /// Stores linear peaks, converting each to a meter level.
    pub fn set_peaks(&self, peaks: &[f32]) {
        for (slot, &peak) in self.levels.iter().zip(peaks) {
            slot.store(level_from_peak(peak), Ordering::Relaxed);
        }
    }

    pub fn silence(&self) {
        for slot in self.levels.iter() {
            slot.store(METER_SILENCE, Ordering::Relaxed);
        }
    }

    pub fn levels(&self) -> Vec<i32> {
        self.levels
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }
}
