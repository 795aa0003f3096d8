use std::io::Write;

use crate::models::error::StreamError;
use crate::traits::stream_sink::StreamSink;

/// Sink writing the stream to any `Write`, such as stdout or a socket.
pub struct WriterSink<W: Write + Send> {
    writer: W,
    bytes_written: u64,
    frames_written: u64,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> StreamSink for WriterSink<W> {
    fn write_data(&mut self, frames: u64, data: &[u8]) -> Result<(), StreamError> {
        self.writer
            .write_all(data)
            .map_err(|e| StreamError::StorageError(format!("write failed: {}", e)))?;
        self.bytes_written += data.len() as u64;
        self.frames_written += frames;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn close(&mut self) -> Result<Option<String>, StreamError> {
        self.writer
            .flush()
            .map_err(|e| StreamError::StorageError(format!("flush failed: {}", e)))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bytes_and_frames() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_data(0, b"head").unwrap();
        sink.write_data(2, &[1, 2, 3, 4]).unwrap();

        assert_eq!(sink.bytes_written(), 8);
        assert_eq!(sink.frames_written(), 2);
        assert_eq!(sink.close().unwrap(), None);
        assert_eq!(sink.into_inner(), b"head\x01\x02\x03\x04".to_vec());
    }
}
