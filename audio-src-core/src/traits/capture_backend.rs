use std::sync::Arc;

use async_trait::async_trait;

use crate::models::audio_models::{CaptureTarget, StreamConfiguration, StreamKind};
use crate::models::error::BackendError;
use crate::models::sample::CapturedSample;
use crate::models::time::MediaTime;

/// Sink invoked for every buffer the backend captures.
///
/// Fires on the backend's own delivery thread; keep processing minimal.
pub type SampleCallback = Arc<dyn Fn(CapturedSample, StreamKind) + Send + Sync + 'static>;

/// OS-level capture subsystem.
///
/// Lifecycle calls are asynchronous; sample delivery happens on a thread
/// the backend owns. A backend drives at most one stream at a time:
/// `create_session` replaces whatever stream existed before.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// List content that can be captured right now.
    async fn enumerate_targets(&self) -> Result<Vec<CaptureTarget>, BackendError>;

    /// Create a (not yet started) stream for `target`.
    async fn create_session(
        &self,
        target: &CaptureTarget,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError>;

    /// Register the sink that receives samples of `kind`.
    fn add_stream_output(
        &self,
        callback: SampleCallback,
        kind: StreamKind,
    ) -> Result<(), BackendError>;

    /// Change parameters of the running stream without interrupting it.
    async fn update_configuration(&self, config: &StreamConfiguration) -> Result<(), BackendError>;

    /// Point the running stream at different content.
    async fn update_content_filter(&self, target: &CaptureTarget) -> Result<(), BackendError>;

    async fn start_capture(&self) -> Result<(), BackendError>;

    async fn stop_capture(&self) -> Result<(), BackendError>;

    /// Current time of the stream's synchronization clock, if a stream exists.
    fn synchronization_clock(&self) -> Option<MediaTime>;
}
