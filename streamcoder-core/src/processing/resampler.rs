//! Streaming sample-rate conversion by linear interpolation.
//!
//! Unlike one-shot resampling of a whole buffer, the converter keeps its
//! fractional read position and the last input frame between calls, so a
//! stream fed block by block comes out without seams at block boundaries.

use thiserror::Error;

/// Most extreme conversion ratio accepted in either direction.
pub const MAX_RATIO: f64 = 256.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResampleError {
    #[error("unsupported channel count: {0}")]
    BadChannelCount(usize),

    #[error("conversion ratio {0} out of range")]
    BadRatio(f64),

    #[error("output buffer too small ({0} frames)")]
    OutputOverflow(usize),
}

/// Interleaved multichannel linear-interpolation resampler.
///
/// The output at stream time `t` (in input frames) blends the two input frames
/// around `t`. Input frame `-1` is the last frame of the previous block, so the
/// first block is delayed by one frame.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    channels: usize,
    ratio: f64,
    step: f64,
    position: f64,
    last: Vec<f32>,
    primed: bool,
}

impl LinearResampler {
    /// `ratio` is output rate over input rate.
    pub fn new(channels: usize, ratio: f64) -> Result<Self, ResampleError> {
        if channels == 0 {
            return Err(ResampleError::BadChannelCount(channels));
        }
        if !ratio.is_finite() || ratio < 1.0 / MAX_RATIO || ratio > MAX_RATIO {
            return Err(ResampleError::BadRatio(ratio));
        }
        Ok(Self {
            channels,
            ratio,
            step: 1.0 / ratio,
            position: 0.0,
            last: vec![0.0; channels],
            primed: false,
        })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Upper bound on frames produced from `input_frames` frames of input.
    pub fn max_output_frames(&self, input_frames: usize) -> usize {
        (input_frames as f64 * self.ratio).ceil() as usize + 1
    }

    /// Converts the whole of `input`, writing interleaved frames to `output`.
    ///
    /// Returns the number of frames generated. On error nothing is consumed
    /// and the converter state is unchanged.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize, ResampleError> {
        let ch = self.channels;
        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Ok(0);
        }
        let out_capacity = output.len() / ch;

        let last = if self.primed {
            self.last.as_slice()
        } else {
            &input[..ch]
        };
        let frame_at = |i: usize, c: usize| -> f32 {
            if i == 0 {
                last[c]
            } else {
                input[(i - 1) * ch + c]
            }
        };

        let mut position = self.position;
        let mut generated = 0;
        while position < in_frames as f64 {
            if generated == out_capacity {
                return Err(ResampleError::OutputOverflow(out_capacity));
            }
            let index = position as usize;
            let fraction = (position - index as f64) as f32;
            let out = &mut output[generated * ch..(generated + 1) * ch];
            for (c, sample) in out.iter_mut().enumerate() {
                *sample = frame_at(index, c) * (1.0 - fraction) + frame_at(index + 1, c) * fraction;
            }
            generated += 1;
            position += self.step;
        }

        self.position = position - in_frames as f64;
        self.last
            .copy_from_slice(&input[(in_frames - 1) * ch..in_frames * ch]);
        self.primed = true;
        Ok(generated)
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last.iter_mut().for_each(|s| *s = 0.0);
        self.primed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            LinearResampler::new(0, 1.0).unwrap_err(),
            ResampleError::BadChannelCount(0)
        );
        assert!(matches!(
            LinearResampler::new(2, 0.0),
            Err(ResampleError::BadRatio(_))
        ));
        assert!(matches!(
            LinearResampler::new(2, f64::NAN),
            Err(ResampleError::BadRatio(_))
        ));
        assert!(LinearResampler::new(2, 1000.0).is_err());
    }

    #[test]
    fn upsample_2x_interpolates_midpoints() {
        let mut rs = LinearResampler::new(1, 2.0).unwrap();
        let mut out = [0.0; 16];

        let n = rs.process(&[0.0, 1.0, 2.0, 3.0], &mut out).unwrap();

        assert_eq!(n, 8);
        let expected = [0.0, 0.0, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        for (o, e) in out[..n].iter().zip(expected) {
            assert_abs_diff_eq!(*o, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn blocks_join_without_seams() {
        let mut rs = LinearResampler::new(1, 2.0).unwrap();
        let mut out = [0.0; 16];
        rs.process(&[0.0, 1.0, 2.0, 3.0], &mut out).unwrap();

        let n = rs.process(&[4.0, 5.0], &mut out).unwrap();

        assert_eq!(n, 4);
        for (o, e) in out[..n].iter().zip([3.0, 3.5, 4.0, 4.5]) {
            assert_abs_diff_eq!(*o, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn stereo_channels_stay_separate() {
        let mut rs = LinearResampler::new(2, 0.5).unwrap();
        let input: Vec<f32> = (0..8).flat_map(|i| [i as f32, -(i as f32)]).collect();
        let mut out = [0.0; 16];

        let n = rs.process(&input, &mut out).unwrap();

        assert_eq!(n, 4);
        for frame in out[..n * 2].chunks_exact(2) {
            assert_abs_diff_eq!(frame[0], -frame[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn total_output_tracks_ratio() {
        let ratio = 44_100.0 / 48_000.0;
        let mut rs = LinearResampler::new(2, ratio).unwrap();
        let block = vec![0.25f32; 1024 * 2];
        let mut out = vec![0.0; rs.max_output_frames(1024) * 2];

        let mut total = 0;
        for _ in 0..100 {
            total += rs.process(&block, &mut out).unwrap();
        }

        let expected = 102_400.0 * ratio;
        assert!((total as f64 - expected).abs() <= 1.0);
    }

    #[test]
    fn overflow_leaves_state_untouched() {
        let mut rs = LinearResampler::new(1, 4.0).unwrap();
        let mut small = [0.0; 3];
        assert_eq!(
            rs.process(&[1.0, 2.0], &mut small),
            Err(ResampleError::OutputOverflow(3))
        );

        let mut out = [0.0; 16];
        assert_eq!(rs.process(&[1.0, 2.0], &mut out).unwrap(), 8);
        assert_abs_diff_eq!(out[0], 1.0);
    }

    #[test]
    fn empty_input_generates_nothing() {
        let mut rs = LinearResampler::new(2, 1.5).unwrap();
        assert_eq!(rs.process(&[], &mut [0.0; 8]).unwrap(), 0);
    }
}
