//! # audio-src-core
//!
//! Live system-audio source for pull-based media pipelines.
//!
//! The pipeline drives a synchronous lifecycle (`start`, `set_caps`,
//! `create`, `stop`) on its own threads while the OS capture API is async and
//! delivers samples on threads of its own. This crate bridges the two:
//! lifecycle calls block on async backend work through a tokio runtime,
//! delivered samples are queued and handed out as timestamped buffers.
//! Platform backends implement the `CaptureBackend` trait.
//!
//! ## Architecture
//!
//! ```text
//! audio-src-core (this crate)
//! ├── element.rs    ← AudioSourceElement (LiveSource impl)
//! ├── bridge.rs     ← BlockingBridge (sync caller → async backend)
//! ├── traits/       ← CaptureBackend, LiveSource, PipelineClock, LogSink
//! ├── models/       ← AudioFormat + caps parsing, CapturedSample, errors, config
//! ├── processing/   ← SampleQueue, ClockReconciler
//! ├── session/      ← CaptureSession, SessionRegistry
//! └── backend/      ← MockCaptureBackend
//! ```

pub mod backend;
pub mod bridge;
pub mod element;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backend::mock::MockCaptureBackend;
pub use bridge::{BlockingBridge, BridgeError};
pub use element::AudioSourceElement;
pub use models::audio_models::{
    AudioFormat, CaptureTarget, StreamConfiguration, StreamKind, TargetKind,
};
pub use models::config::{QueueBound, SourceConfiguration};
pub use models::error::{BackendError, ClockError, FormatError, SourceError};
pub use models::sample::{AudioMeta, CapturedSample, OutputBuffer};
pub use models::state::CaptureState;
pub use models::time::{ClockTime, MediaTime};
pub use processing::clock::ClockReconciler;
pub use processing::sample_queue::SampleQueue;
pub use session::capture::CaptureSession;
pub use traits::capture_backend::{CaptureBackend, SampleCallback};
pub use traits::live_source::{FlowReturn, Format, LiveSource};
pub use traits::logger::{LogCrateSink, LogSink};
pub use traits::pipeline_clock::{PipelineClock, SystemClock};
