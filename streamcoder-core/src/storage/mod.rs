pub mod file_sink;
pub mod metadata;
pub mod writer_sink;
