use std::path::Path;

use crate::models::error::StreamError;

/// Destination for encoded stream bytes.
pub trait StreamSink: Send {
    /// Writes `data`, which carries `frames` frames of audio (0 for headers).
    fn write_data(&mut self, frames: u64, data: &[u8]) -> Result<(), StreamError>;

    /// Total bytes accepted so far.
    fn bytes_written(&self) -> u64;

    /// Flushes and closes the sink, returning a content checksum when the
    /// sink computes one.
    fn close(&mut self) -> Result<Option<String>, StreamError>;

    /// Location of the output, for sinks that write a file.
    fn file_path(&self) -> Option<&Path> {
        None
    }
}
