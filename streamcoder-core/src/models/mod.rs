pub mod audio_models;
pub mod config;
pub mod error;
pub mod session_result;
pub mod state;
