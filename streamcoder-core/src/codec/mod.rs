//! Encoder backends, the factory selecting them by [`CodecKind`], and the
//! pipeline that feeds them.

pub mod ogg_opus;
pub mod pcm16;
pub mod pipeline;
pub mod unavailable;

use crate::models::audio_models::CodecKind;
use crate::models::error::StreamError;
use crate::traits::codec_backend::CodecBackend;

use self::ogg_opus::OpusCodec;
use self::pcm16::Pcm16Codec;
use self::unavailable::UnavailableCodec;

/// The backend type for `kind`, whether or not it can run in this build.
pub fn backend_for(kind: CodecKind) -> Box<dyn CodecBackend> {
    match kind {
        CodecKind::Pcm16 => Box::new(Pcm16Codec::new()),
        CodecKind::Opus => Box::new(OpusCodec::new()),
        CodecKind::Aacp | CodecKind::Mp2 | CodecKind::Mp3 | CodecKind::Vorbis => {
            Box::new(UnavailableCodec::new(kind))
        }
    }
}

/// Builds the encoder backend for `kind`, refusing formats this build
/// cannot encode.
pub fn create_backend(kind: CodecKind) -> Result<Box<dyn CodecBackend>, StreamError> {
    let backend = backend_for(kind);
    if !backend.is_available() {
        return Err(StreamError::UnsupportedCodec(format!(
            "{} ({}) encoding is not available in this build",
            kind.keyword(),
            kind.description()
        )));
    }
    Ok(backend)
}

/// Whether `kind` has an encoder in this build.
pub fn codec_is_available(kind: CodecKind) -> bool {
    backend_for(kind).is_available()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_backend_type() {
        for kind in CodecKind::ALL {
            let backend = backend_for(kind);
            assert_eq!(backend.kind(), kind);
            assert!(backend.pcm_frames() > 0);
            assert_eq!(create_backend(kind).is_ok(), codec_is_available(kind));
        }
        assert!(codec_is_available(CodecKind::Pcm16));
        assert_eq!(codec_is_available(CodecKind::Opus), cfg!(feature = "opus"));
        assert!(matches!(
            create_backend(CodecKind::Mp3),
            Err(StreamError::UnsupportedCodec(_))
        ));
    }
}
