use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::audio_models::{CodecKind, DeviceKind};
use super::error::StreamError;

/// Most channels a stream may carry.
pub const MAX_AUDIO_CHANNELS: u16 = 2;

/// Default ring size in bytes, about 1.3 s of 48 kHz stereo.
pub const DEFAULT_RINGBUFFER_SIZE: usize = 262_144;

/// Smallest ring accepted: two 1024-frame stereo blocks, so a whole block
/// still fits beside the byte a ring keeps free.
pub const MIN_RINGBUFFER_SIZE: usize = 2 * 1024 * MAX_AUDIO_CHANNELS as usize * 4;

/// Lowest stream sample rate accepted.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Highest stream sample rate accepted.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Configuration for a stream session.
///
/// Loadable from JSON; absent fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    /// Capture backend (default: signal).
    pub device: DeviceKind,

    /// Stream format (default: pcm16).
    pub codec: CodecKind,

    /// Stream channel count, 1 or 2 (default: 2).
    pub channels: u16,

    /// Stream sample rate in Hz (default: 48000).
    pub sample_rate: u32,

    /// Target bitrate in kbit/s for lossy formats (default: 128).
    pub bitrate: u32,

    /// Encoder quality in `[0.0, 1.0]` (default: 0.5).
    pub quality: f64,

    /// Pad the trailing block with silence when the stream ends.
    pub complete_frames: bool,

    /// Primary ring buffer size in bytes (rounded up to a power of two).
    pub ring_buffer_bytes: usize,

    /// Period of the encode loop in milliseconds (default: 20).
    pub encode_interval_ms: u64,

    /// Backend-specific `key=value` options.
    pub device_options: BTreeMap<String, String>,
}

impl StreamConfiguration {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.channels == 0 || self.channels > MAX_AUDIO_CHANNELS {
            return Err(StreamError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(StreamError::ConfigurationFailed(format!(
                "sample rate must be {}-{} Hz, got {}",
                MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, self.sample_rate
            )));
        }
        if self.bitrate == 0 {
            return Err(StreamError::ConfigurationFailed(
                "bitrate must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(StreamError::ConfigurationFailed(format!(
                "quality must be between 0.0 and 1.0, got {}",
                self.quality
            )));
        }
        if self.ring_buffer_bytes < MIN_RINGBUFFER_SIZE {
            return Err(StreamError::ConfigurationFailed(format!(
                "ring buffer of {} bytes is below the {} byte minimum",
                self.ring_buffer_bytes, MIN_RINGBUFFER_SIZE
            )));
        }
        if self.encode_interval_ms == 0 || self.encode_interval_ms > 1000 {
            return Err(StreamError::ConfigurationFailed(format!(
                "encode interval must be 1-1000 ms, got {}",
                self.encode_interval_ms
            )));
        }
        Ok(())
    }

    /// Reads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: &Path) -> Result<Self, StreamError> {
        let json = fs::read_to_string(path).map_err(|e| {
            StreamError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            StreamError::ConfigurationFailed(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Device options as ordered `(key, value)` pairs.
    pub fn device_option_pairs(&self) -> Vec<(String, String)> {
        self.device_options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            device: DeviceKind::Signal,
            codec: CodecKind::Pcm16,
            channels: 2,
            sample_rate: 48000,
            bitrate: 128,
            quality: 0.5,
            complete_frames: false,
            ring_buffer_bytes: DEFAULT_RINGBUFFER_SIZE,
            encode_interval_ms: 20,
            device_options: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.device, DeviceKind::Signal);
        assert_eq!(config.codec, CodecKind::Pcm16);
        assert_eq!(config.ring_buffer_bytes, 262_144);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            StreamConfiguration { channels: 3, ..Default::default() },
            StreamConfiguration { channels: 0, ..Default::default() },
            StreamConfiguration { sample_rate: 0, ..Default::default() },
            StreamConfiguration { sample_rate: 200_000_000, ..Default::default() },
            StreamConfiguration { sample_rate: 4000, ..Default::default() },
            StreamConfiguration { quality: 1.5, ..Default::default() },
            StreamConfiguration { ring_buffer_bytes: 1024, ..Default::default() },
            StreamConfiguration { ring_buffer_bytes: 8192, ..Default::default() },
            StreamConfiguration { encode_interval_ms: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(StreamError::ConfigurationFailed(_))
            ));
        }
    }

    #[test]
    fn smallest_ring_is_accepted() {
        let config = StreamConfiguration {
            ring_buffer_bytes: MIN_RINGBUFFER_SIZE,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sample_rate_bounds_are_inclusive() {
        for rate in [MIN_SAMPLE_RATE, 44100, MAX_SAMPLE_RATE] {
            let config = StreamConfiguration { sample_rate: rate, ..Default::default() };
            assert!(config.validate().is_ok(), "{} Hz", rate);
        }
    }

    #[test]
    fn partial_json_takes_defaults() {
        let json = r#"{
            "device": "file",
            "channels": 1,
            "device_options": { "file-name": "/tmp/in.wav" }
        }"#;
        let config: StreamConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.device, DeviceKind::File);
        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(
            config.device_option_pairs(),
            vec![("file-name".to_string(), "/tmp/in.wav".to_string())]
        );
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("streamcoder-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{ "codec": "pcm16", "sample_rate": 44100 }"#).unwrap();

        let config = StreamConfiguration::from_json_file(&path).unwrap();
        assert_eq!(config.sample_rate, 44100);

        fs::write(&path, r#"{ "channels": 6 }"#).unwrap();
        assert!(StreamConfiguration::from_json_file(&path).is_err());

        fs::remove_file(&path).unwrap();
    }
}
