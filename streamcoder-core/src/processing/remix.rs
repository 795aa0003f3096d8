//! Channel remixing between a device's native layout and the stream layout.
//!
//! Only identity, mono→stereo and stereo→mono are supported. Devices build a
//! [`Remix`] when they start so an unsupported layout is reported as a
//! configuration error before any audio flows.

use crate::models::error::StreamError;

/// A validated channel conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remix {
    Passthrough { channels: usize },
    MonoToStereo,
    StereoToMono,
}

impl Remix {
    pub fn new(chans_in: usize, chans_out: usize) -> Result<Self, StreamError> {
        match (chans_in, chans_out) {
            (a, b) if a == b && a > 0 => Ok(Self::Passthrough { channels: a }),
            (1, 2) => Ok(Self::MonoToStereo),
            (2, 1) => Ok(Self::StereoToMono),
            _ => Err(StreamError::ConfigurationFailed(format!(
                "invalid channel remix: chans_in: {}  chans_out: {}",
                chans_in, chans_out
            ))),
        }
    }

    pub fn channels_in(&self) -> usize {
        match self {
            Self::Passthrough { channels } => *channels,
            Self::MonoToStereo => 1,
            Self::StereoToMono => 2,
        }
    }

    pub fn channels_out(&self) -> usize {
        match self {
            Self::Passthrough { channels } => *channels,
            Self::MonoToStereo => 2,
            Self::StereoToMono => 1,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough { .. })
    }

    /// Remixes `frames` frames of `pcm_in` into `pcm_out`.
    ///
    /// Returns the number of frames produced, limited by both slices.
    pub fn apply(&self, pcm_out: &mut [f32], pcm_in: &[f32], frames: usize) -> usize {
        let frames = frames
            .min(pcm_in.len() / self.channels_in())
            .min(pcm_out.len() / self.channels_out());
        remix_channels(
            pcm_out,
            self.channels_out(),
            pcm_in,
            self.channels_in(),
            frames,
        );
        frames
    }
}

/// Remixes interleaved audio from `chans_in` to `chans_out` channels.
///
/// Mono→stereo duplicates each sample; stereo→mono averages the pair.
///
/// # Panics
/// Panics on any other channel combination. Converting between unrelated
/// layouts would silently corrupt the stream; use [`Remix::new`] to validate
/// a combination up front.
pub fn remix_channels(
    pcm_out: &mut [f32],
    chans_out: usize,
    pcm_in: &[f32],
    chans_in: usize,
    frames: usize,
) {
    if chans_in == chans_out {
        let n = frames * chans_in;
        pcm_out[..n].copy_from_slice(&pcm_in[..n]);
        return;
    }
    match (chans_in, chans_out) {
        (1, 2) => {
            for (out, &sample) in pcm_out.chunks_exact_mut(2).zip(&pcm_in[..frames]) {
                out[0] = sample;
                out[1] = sample;
            }
        }
        (2, 1) => {
            for (out, pair) in pcm_out[..frames].iter_mut().zip(pcm_in.chunks_exact(2)) {
                *out = (pair[0] + pair[1]) / 2.0;
            }
        }
        _ => {
            log::error!(
                "invalid channel remix: chans_in: {}  chans_out: {}",
                chans_in,
                chans_out
            );
            panic!(
                "invalid channel remix: chans_in: {} chans_out: {}",
                chans_in, chans_out
            );
        }
    }
}
