use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::StreamError;
use crate::traits::stream_sink::StreamSink;

/// Sink writing the stream to a file and hashing it on the way.
///
/// The SHA-256 digest covers every byte written, prologue included, and is
/// returned by `close`.
pub struct FileSink {
    file_path: PathBuf,
    file: Option<BufWriter<File>>,
    hasher: Sha256,
    bytes_written: u64,
    frames_written: u64,
}

impl FileSink {
    /// Creates (or truncates) the file, creating parent directories as needed.
    pub fn create(file_path: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StreamError::StorageError(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(&file_path)
            .map_err(|e| StreamError::StorageError(format!("failed to create file: {}", e)))?;
        Ok(Self {
            file_path,
            file: Some(BufWriter::new(file)),
            hasher: Sha256::new(),
            bytes_written: 0,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl StreamSink for FileSink {
    fn write_data(&mut self, frames: u64, data: &[u8]) -> Result<(), StreamError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StreamError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| StreamError::StorageError(format!("write failed: {}", e)))?;
        self.hasher.update(data);
        self.bytes_written += data.len() as u64;
        self.frames_written += frames;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn close(&mut self) -> Result<Option<String>, StreamError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StreamError::StorageError("file is not open".into()))?;
        file.flush()
            .map_err(|e| StreamError::StorageError(format!("flush failed: {}", e)))?;
        let digest = std::mem::take(&mut self.hasher).finalize();
        Ok(Some(hex_encode(&digest)))
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.file_path)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
