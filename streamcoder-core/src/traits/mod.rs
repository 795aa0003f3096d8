pub mod audio_device;
pub mod codec_backend;
pub mod device_delegate;
pub mod session_delegate;
pub mod stream_sink;
