//! Command-line interface for streamcoder
//!
//! Handles argument parsing, logging configuration and turning the flags into
//! a `StreamConfiguration`.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use streamcoder_core::{CodecKind, DeviceKind, StreamConfiguration, StreamError};

/// streamcoder - capture live audio and stream it through an encoder
#[derive(Parser, Debug)]
#[command(name = "streamcoder")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration file; other flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Capture backend (file, signal, cpal)
    #[arg(long = "audio-device", value_name = "DEVICE")]
    pub audio_device: Option<DeviceKind>,

    /// Stream format (aacp, mp2, mp3, vorbis, pcm16, opus)
    #[arg(long = "audio-format", value_name = "FORMAT")]
    pub audio_format: Option<CodecKind>,

    /// Stream channel count
    #[arg(long = "audio-channels", value_name = "CHANS")]
    pub audio_channels: Option<u16>,

    /// Stream sample rate in Hz
    #[arg(long = "audio-samplerate", value_name = "RATE")]
    pub audio_samplerate: Option<u32>,

    /// Bitrate in kbit/s
    #[arg(long = "audio-bitrate", value_name = "KBPS")]
    pub audio_bitrate: Option<u32>,

    /// Encoder quality, 0.0 to 1.0
    #[arg(long = "audio-quality", value_name = "QUALITY")]
    pub audio_quality: Option<f64>,

    /// Pad the last block of the stream with silence
    #[arg(long = "audio-complete-frames")]
    pub audio_complete_frames: bool,

    /// Device option, may be repeated (e.g. --device-option file-name=in.wav)
    #[arg(
        long = "device-option",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        allow_hyphen_values = true
    )]
    pub device_options: Vec<(String, String)>,

    /// Output file, or "-" for stdout
    #[arg(long, short, value_name = "PATH", default_value = "-")]
    pub output: String,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<f64>,

    /// Print "ME LLLLRRRR" meter lines on stderr every 50 ms
    #[arg(long = "meter-data")]
    pub meter_data: bool,

    /// List stream formats and exit
    #[arg(long = "list-codecs")]
    pub list_codecs: bool,

    /// List capture backends and exit
    #[arg(long = "list-devices")]
    pub list_devices: bool,

    /// Increase logging verbosity
    /// -v = debug, -vv = trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    pub fn writes_to_stdout(&self) -> bool {
        self.output == "-"
    }

    /// Loads `--config` (or the defaults) and applies the command-line
    /// overrides.
    pub fn stream_configuration(&self) -> Result<StreamConfiguration, StreamError> {
        let mut config = match self.config {
            Some(ref path) => StreamConfiguration::from_json_file(path)?,
            None => StreamConfiguration::default(),
        };
        if let Some(device) = self.audio_device {
            config.device = device;
        }
        if let Some(codec) = self.audio_format {
            config.codec = codec;
        }
        if let Some(channels) = self.audio_channels {
            config.channels = channels;
        }
        if let Some(rate) = self.audio_samplerate {
            config.sample_rate = rate;
        }
        if let Some(bitrate) = self.audio_bitrate {
            config.bitrate = bitrate;
        }
        if let Some(quality) = self.audio_quality {
            config.quality = quality;
        }
        if self.audio_complete_frames {
            config.complete_frames = true;
        }
        for (key, value) in &self.device_options {
            let key = key.strip_prefix("--").unwrap_or(key);
            config.device_options.insert(key.to_string(), value.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for dependencies
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("streamcoder", args.log_level());
    builder.filter_module("streamcoder_core", args.log_level());

    // RUST_LOG still wins when set
    builder.parse_default_env();

    // logs go to stderr so stdout can carry the stream
    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "streamcoder",
            "--audio-device",
            "file",
            "--audio-channels",
            "1",
            "--audio-samplerate",
            "44100",
            "--device-option",
            "file-name=/tmp/in.wav",
            "--output",
            "/tmp/out.wav",
        ]);
        let config = args.stream_configuration().unwrap();

        assert_eq!(config.device, DeviceKind::File);
        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.codec, CodecKind::Pcm16);
        assert_eq!(config.device_options["file-name"], "/tmp/in.wav");
        assert!(!args.writes_to_stdout());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let args = Args::parse_from(["streamcoder", "--audio-channels", "6"]);
        assert!(args.stream_configuration().is_err());

        assert!(Args::try_parse_from(["streamcoder", "--audio-format", "flac"]).is_err());
        assert!(Args::try_parse_from(["streamcoder", "--device-option", "novalue"]).is_err());
    }

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("file-name=a=b.wav").unwrap(),
            ("file-name".to_string(), "a=b.wav".to_string())
        );
        assert!(parse_key_value("=x").is_err());
    }
}
