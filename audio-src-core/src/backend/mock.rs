//! In-memory capture backend for testing.
//!
//! Records every call, can be told to fail individual operations, and lets
//! the test play the role of the backend delivery thread via
//! [`MockCaptureBackend::deliver`].

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::audio_models::{CaptureTarget, StreamConfiguration, StreamKind, TargetKind};
use crate::models::error::BackendError;
use crate::models::sample::CapturedSample;
use crate::models::time::MediaTime;
use crate::traits::capture_backend::{CaptureBackend, SampleCallback};

/// A call the backend received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    EnumerateTargets,
    CreateSession { target: String, config: StreamConfiguration },
    AddStreamOutput(StreamKind),
    UpdateConfiguration(StreamConfiguration),
    UpdateContentFilter(String),
    StartCapture,
    StopCapture,
}

/// Operation the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    Enumerate,
    CreateSession,
    AddStreamOutput,
    UpdateConfiguration,
    UpdateContentFilter,
    StartCapture,
    StopCapture,
}

pub struct MockCaptureBackend {
    targets: Mutex<Vec<CaptureTarget>>,
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<HashSet<MockFailure>>,
    // Sinks stay registered for the mock's lifetime, so sinks of earlier
    // sessions keep seeing samples the way a lagging OS stream would.
    outputs: Mutex<Vec<(SampleCallback, StreamKind)>>,
    clock: Mutex<Option<MediaTime>>,
    start_delay: Mutex<Option<Duration>>,
}

impl MockCaptureBackend {
    /// Mock with a single display target and a stream clock at zero.
    pub fn new() -> Self {
        Self::with_targets(vec![CaptureTarget {
            id: "display-1".into(),
            name: "Built-in Display".into(),
            kind: TargetKind::Display,
        }])
    }

    pub fn with_targets(targets: Vec<CaptureTarget>) -> Self {
        Self {
            targets: Mutex::new(targets),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            outputs: Mutex::new(Vec::new()),
            clock: Mutex::new(Some(MediaTime::from_nanos(0))),
            start_delay: Mutex::new(None),
        }
    }

    pub fn set_targets(&self, targets: Vec<CaptureTarget>) {
        *self.targets.lock() = targets;
    }

    pub fn fail(&self, failure: MockFailure) {
        self.failures.lock().insert(failure);
    }

    pub fn heal(&self, failure: MockFailure) {
        self.failures.lock().remove(&failure);
    }

    /// Make `start_capture` take this long.
    pub fn set_start_delay(&self, delay: Option<Duration>) {
        *self.start_delay.lock() = delay;
    }

    pub fn set_clock(&self, now: Option<MediaTime>) {
        *self.clock.lock() = now;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    /// Hand `sample` to every registered sink, as the delivery thread would.
    pub fn deliver(&self, sample: CapturedSample, kind: StreamKind) {
        // Clone out so sinks run without the lock held.
        let outputs: Vec<SampleCallback> =
            self.outputs.lock().iter().map(|(cb, _)| cb.clone()).collect();
        for output in outputs {
            output(sample.clone(), kind);
        }
    }

    pub fn output_count(&self) -> usize {
        self.outputs.lock().len()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    fn check(
        &self,
        failure: MockFailure,
        error: impl FnOnce(String) -> BackendError,
    ) -> Result<(), BackendError> {
        if self.failures.lock().contains(&failure) {
            return Err(error(format!("mock {:?} failure", failure)));
        }
        Ok(())
    }
}

impl Default for MockCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for MockCaptureBackend {
    async fn enumerate_targets(&self) -> Result<Vec<CaptureTarget>, BackendError> {
        self.record(BackendCall::EnumerateTargets);
        self.check(MockFailure::Enumerate, BackendError::Enumeration)?;
        Ok(self.targets.lock().clone())
    }

    async fn create_session(
        &self,
        target: &CaptureTarget,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::CreateSession {
            target: target.id.clone(),
            config: *config,
        });
        self.check(MockFailure::CreateSession, BackendError::SessionCreation)
    }

    fn add_stream_output(
        &self,
        callback: SampleCallback,
        kind: StreamKind,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::AddStreamOutput(kind));
        self.check(MockFailure::AddStreamOutput, BackendError::SessionCreation)?;
        self.outputs.lock().push((callback, kind));
        Ok(())
    }

    async fn update_configuration(&self, config: &StreamConfiguration) -> Result<(), BackendError> {
        self.record(BackendCall::UpdateConfiguration(*config));
        self.check(MockFailure::UpdateConfiguration, BackendError::Configuration)
    }

    async fn update_content_filter(&self, target: &CaptureTarget) -> Result<(), BackendError> {
        self.record(BackendCall::UpdateContentFilter(target.id.clone()));
        self.check(MockFailure::UpdateContentFilter, BackendError::Configuration)
    }

    async fn start_capture(&self) -> Result<(), BackendError> {
        self.record(BackendCall::StartCapture);
        let delay = *self.start_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(MockFailure::StartCapture, BackendError::Start)
    }

    async fn stop_capture(&self) -> Result<(), BackendError> {
        self.record(BackendCall::StopCapture);
        self.check(MockFailure::StopCapture, BackendError::Stop)
    }

    fn synchronization_clock(&self) -> Option<MediaTime> {
        *self.clock.lock()
    }
}
