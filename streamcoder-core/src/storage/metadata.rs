use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::StreamError;
use crate::models::session_result::StreamMetadata;

/// `{output}.json` next to the stream file.
pub fn sidecar_path(output_path: &Path) -> PathBuf {
    let mut name = OsString::from(output_path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

/// Writes stream metadata as a JSON sidecar file. Returns its path.
pub fn write_metadata(metadata: &StreamMetadata, output_path: &Path) -> Result<PathBuf, StreamError> {
    let path = sidecar_path(output_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| StreamError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json)
        .map_err(|e| StreamError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

pub fn read_metadata(output_path: &Path) -> Result<StreamMetadata, StreamError> {
    let json = fs::read_to_string(sidecar_path(output_path))
        .map_err(|e| StreamError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| StreamError::StorageError(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::CodecKind;

    #[test]
    fn sidecar_keeps_full_file_name() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/show.wav")),
            PathBuf::from("/tmp/show.wav.json")
        );
    }

    #[test]
    fn metadata_survives_a_trip_to_disk() {
        let output = std::env::temp_dir().join(format!("streamcoder_meta_{}.wav", uuid::Uuid::new_v4()));
        let mut metadata = StreamMetadata::new(CodecKind::Pcm16, 2, 44100, 48000, 128);
        metadata.duration_secs = 1.5;
        metadata.checksum = Some("00ff".into());

        let written = write_metadata(&metadata, &output).unwrap();
        let json = fs::read_to_string(&written).unwrap();
        assert!(json.contains("\"codec\": \"pcm16\""));
        assert!(json.contains("\"content_type\": \"audio/wav\""));

        assert_eq!(read_metadata(&output).unwrap(), metadata);
        fs::remove_file(&written).unwrap();
    }

    #[test]
    fn missing_sidecar_is_a_storage_error() {
        let output = std::env::temp_dir().join("streamcoder_meta_missing.wav");
        assert!(matches!(
            read_metadata(&output),
            Err(StreamError::StorageError(_))
        ));
    }
}
