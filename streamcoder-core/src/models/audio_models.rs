use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Capture backend selected by its configuration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    File,
    Signal,
    Cpal,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [DeviceKind::File, DeviceKind::Signal, DeviceKind::Cpal];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Signal => "signal",
            Self::Cpal => "cpal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::File => "Audio file playback",
            Self::Signal => "Test tone generator",
            Self::Cpal => "Hardware capture (cpal)",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for DeviceKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| StreamError::DeviceNotAvailable(format!("unknown audio device \"{}\"", s)))
    }
}

/// Stream format selected by its configuration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    Aacp,
    Mp2,
    Mp3,
    Vorbis,
    Pcm16,
    Opus,
}

impl CodecKind {
    pub const ALL: [CodecKind; 6] = [
        CodecKind::Aacp,
        CodecKind::Mp2,
        CodecKind::Mp3,
        CodecKind::Vorbis,
        CodecKind::Pcm16,
        CodecKind::Opus,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Aacp => "aacp",
            Self::Mp2 => "mp2",
            Self::Mp3 => "mp3",
            Self::Vorbis => "vorbis",
            Self::Pcm16 => "pcm16",
            Self::Opus => "opus",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Aacp => "HE-AAC+",
            Self::Mp2 => "MPEG-1 Layer 2",
            Self::Mp3 => "MPEG-1 Layer 3",
            Self::Vorbis => "OggVorbis",
            Self::Pcm16 => "PCM16 Linear",
            Self::Opus => "Opus",
        }
    }

    /// MIME type announced to listeners.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Aacp => "audio/aacp",
            Self::Mp2 => "audio/mpeg",
            Self::Mp3 => "audio/mpeg",
            Self::Vorbis => "application/ogg",
            Self::Pcm16 => "audio/wav",
            Self::Opus => "application/ogg",
        }
    }

    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Aacp => "aac",
            Self::Mp2 => "mp2",
            Self::Mp3 => "mp3",
            Self::Vorbis => "ogg",
            Self::Pcm16 => "wav",
            Self::Opus => "opus",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for CodecKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| StreamError::UnsupportedCodec(format!("unknown audio format \"{}\"", s)))
    }
}
