pub mod audio_models;
pub mod caps;
pub mod config;
pub mod error;
pub mod sample;
pub mod state;
pub mod time;
