//! # audio-src-synthetic
//!
//! Synthetic capture backend for audio-src.
//!
//! Provides:
//! - `SyntheticCaptureBackend`: one display target, tone delivered in 10 ms
//!   chunks on a dedicated thread, stamped with its own monotonic clock
//! - `ToneGenerator`: phase-continuous sine generator
//!
//! Useful wherever the element has to run without an OS capture framework:
//! tests, demos, CI machines without audio hardware.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_src_core::{AudioSourceElement, LiveSource, LogCrateSink, SourceConfiguration};
//! use audio_src_synthetic::SyntheticCaptureBackend;
//!
//! let backend = Arc::new(SyntheticCaptureBackend::default());
//! let config = SourceConfiguration::default();
//! let mut source = AudioSourceElement::new(backend, config, Arc::new(LogCrateSink))?;
//! source.set_caps("audio/x-raw, rate=48000, channels=2");
//! ```

pub mod synthetic_backend;
pub mod tone;

pub use synthetic_backend::{SyntheticCaptureBackend, SyntheticSettings};
pub use tone::{Tone, ToneGenerator};
