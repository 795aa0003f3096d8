pub mod convert;
pub mod meter;
pub mod remix;
pub mod resampler;
pub mod ring_buffer;
pub mod wav_format;
