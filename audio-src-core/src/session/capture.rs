use std::sync::Arc;

use log::Level;
use parking_lot::Mutex;

use crate::models::audio_models::{
    AudioFormat, CaptureTarget, SessionDiagnostics, StreamConfiguration, StreamKind, TargetKind,
};
use crate::models::error::BackendError;
use crate::models::sample::CapturedSample;
use crate::models::state::{CaptureState, StartPlan};
use crate::models::time::MediaTime;
use crate::processing::sample_queue::{PushOutcome, SampleQueue};
use crate::session::registry::{Delivery, SessionId, SessionRegistry};
use crate::traits::capture_backend::{CaptureBackend, SampleCallback};
use crate::traits::logger::LogSink;

/// Mutable session state, protected by `parking_lot::Mutex`.
///
/// Never held across an `.await`.
struct SessionState {
    state: CaptureState,
    format: Option<AudioFormat>,
    exclude_current_process_audio: bool,
    target: Option<CaptureTarget>,
    registration: Option<SessionId>,
    /// A backend stream exists and may be capturing.
    backend_session: bool,
}

impl SessionState {
    fn new(exclude_current_process_audio: bool) -> Self {
        Self {
            state: CaptureState::Idle,
            format: None,
            exclude_current_process_audio,
            target: None,
            registration: None,
            backend_session: false,
        }
    }
}

/// Owns the lifecycle of one backend capture stream.
///
/// Cheap to clone; clones share the same state, so a clone can be moved into
/// a `'static` task while the owner keeps using the original.
///
/// Data flow:
/// ```text
/// [backend thread] → sink(id) → [SessionRegistry] → [SampleQueue] → consumer
/// ```
#[derive(Clone)]
pub struct CaptureSession {
    backend: Arc<dyn CaptureBackend>,
    queue: Arc<SampleQueue>,
    registry: Arc<SessionRegistry>,
    session_state: Arc<Mutex<SessionState>>,
    log: Arc<dyn LogSink>,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        queue: Arc<SampleQueue>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            backend,
            queue,
            registry: Arc::new(SessionRegistry::new()),
            session_state: Arc::new(Mutex::new(SessionState::new(true))),
            log,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.session_state.lock().state
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.session_state.lock().format
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.registry.diagnostics()
    }

    /// Target the running stream captures from.
    pub fn target(&self) -> Option<CaptureTarget> {
        self.session_state.lock().target.clone()
    }

    /// Current time of the backend's synchronization clock.
    pub fn synchronization_clock(&self) -> Option<MediaTime> {
        self.backend.synchronization_clock()
    }

    /// Store the format the next start or reconfiguration will use.
    pub fn configure(&self, format: AudioFormat) {
        self.session_state.lock().format = Some(format);
    }

    pub fn exclude_current_process_audio(&self) -> bool {
        self.session_state.lock().exclude_current_process_audio
    }

    /// Takes effect the next time a stream configuration is built, i.e. on
    /// the next start or reconfiguration. A running stream is not touched.
    pub fn set_exclude_current_process_audio(&self, exclude: bool) {
        let mut s = self.session_state.lock();
        if s.state.is_active() && s.exclude_current_process_audio != exclude {
            self.log.log(
                Level::Info,
                "exclude-current-process-audio changed during capture, \
                 applies on next reconfiguration",
            );
        }
        s.exclude_current_process_audio = exclude;
    }

    /// Bring the backend stream up with the configured format.
    ///
    /// From idle this creates and starts a new stream; while active it pushes
    /// the configuration to the running stream instead. On failure the
    /// session is back to idle.
    pub async fn ensure_started(&self) -> Result<(), BackendError> {
        let (plan, config) = {
            let mut s = self.session_state.lock();
            let Some(format) = s.format else {
                self.log.log(Level::Error, "audio format not present, aborting");
                return Err(BackendError::NotConfigured);
            };
            let Some(plan) = StartPlan::for_state(s.state) else {
                self.log.log(Level::Warn, "capture setup already in progress");
                return Err(BackendError::Busy);
            };
            s.state = CaptureState::Starting;
            (plan, StreamConfiguration::for_audio(format, s.exclude_current_process_audio))
        };

        let mut guard = StartingGuard::new(self);
        let result = self.run_plan(plan, &config).await;
        guard.disarm();

        match result {
            Ok(()) => {
                self.session_state.lock().state = CaptureState::Active;
                self.registry.record(|d| match plan {
                    StartPlan::Fresh => d.fresh_starts += 1,
                    StartPlan::Reconfigure => d.reconfigurations += 1,
                });
                self.log.log(Level::Debug, &format!("capture setup finished ({:?})", plan));
                Ok(())
            }
            Err(e) => {
                self.log.log(Level::Error, &format!("capture setup failed: {}", e));
                self.abandon(plan).await;
                Err(e)
            }
        }
    }

    async fn run_plan(
        &self,
        plan: StartPlan,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError> {
        let target = self.pick_target().await?;
        match plan {
            StartPlan::Fresh => self.start_fresh(&target, config).await?,
            StartPlan::Reconfigure => self.reconfigure(&target, config).await?,
        }
        self.session_state.lock().target = Some(target);
        Ok(())
    }

    async fn pick_target(&self) -> Result<CaptureTarget, BackendError> {
        let targets = self.backend.enumerate_targets().await?;
        match targets.into_iter().find(|t| t.kind == TargetKind::Display) {
            Some(target) => Ok(target),
            None => {
                self.log.log(Level::Error, "couldn't find a display to capture from");
                Err(BackendError::NoCaptureTarget)
            }
        }
    }

    async fn start_fresh(
        &self,
        target: &CaptureTarget,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError> {
        self.backend.create_session(target, config).await?;
        self.session_state.lock().backend_session = true;

        let id = self.registry.register(Arc::clone(&self.queue), StreamKind::Audio);
        self.session_state.lock().registration = Some(id);
        self.backend.add_stream_output(self.sample_callback(id), StreamKind::Audio)?;

        self.backend.start_capture().await
    }

    /// The backend supports changing parameters of a running stream, so an
    /// active session is never restarted for a new format.
    async fn reconfigure(
        &self,
        target: &CaptureTarget,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError> {
        self.backend.update_configuration(config).await?;
        self.backend.update_content_filter(target).await
    }

    /// Put the session back to idle after a failed start.
    async fn abandon(&self, plan: StartPlan) {
        match plan {
            StartPlan::Fresh => {
                self.detach();
                let mut s = self.session_state.lock();
                s.state = CaptureState::Idle;
                s.target = None;
            }
            // The stream is still running with its old configuration.
            StartPlan::Reconfigure => self.stop().await,
        }
    }

    /// Tear the stream down. Always ends idle with an empty queue.
    ///
    /// Backend errors are logged; the session is discarded either way.
    pub async fn stop(&self) {
        let had_stream = self.session_state.lock().backend_session;

        // Detach and drain first: a delivery thread blocked on a full queue
        // has to get out of `push` before the backend can join it.
        self.detach();
        self.queue.clear();

        if had_stream {
            if let Err(e) = self.backend.stop_capture().await {
                self.log.log(Level::Warn, &format!("failed to stop capture: {}", e));
            }
        }

        // Whatever a released producer pushed on its way out.
        self.queue.clear();

        let mut s = self.session_state.lock();
        s.state = CaptureState::Idle;
        s.target = None;
        s.backend_session = false;
    }

    /// Retire the sink registration so late samples are dropped.
    fn detach(&self) {
        let registration = self.session_state.lock().registration.take();
        if let Some(id) = registration {
            self.registry.retire(id);
        }
    }

    fn sample_callback(&self, id: SessionId) -> SampleCallback {
        let registry = Arc::downgrade(&self.registry);
        let log = Arc::clone(&self.log);

        Arc::new(move |sample: CapturedSample, kind: StreamKind| {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            match registry.deliver(id, sample, kind) {
                Delivery::Queued(PushOutcome::DisplacedOldest) => {
                    log.log(Level::Debug, "sample queue full, dropped oldest sample")
                }
                Delivery::Detached => {
                    log.log(Level::Trace, &format!("dropping late sample for session {}", id))
                }
                Delivery::Queued(PushOutcome::Discarded) => {
                    log.log(Level::Debug, "sample discarded, queue cleared while full")
                }
                Delivery::Queued(PushOutcome::Queued) | Delivery::ForeignKind => {}
            }
        })
    }
}

/// Resets a session stuck in `Starting` when the start future is dropped
/// before finishing, e.g. by a bridge timeout.
struct StartingGuard<'a> {
    session: &'a CaptureSession,
    armed: bool,
}

impl<'a> StartingGuard<'a> {
    fn new(session: &'a CaptureSession) -> Self {
        Self { session, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.session.detach();
        let mut s = self.session.session_state.lock();
        s.state = CaptureState::Idle;
        s.target = None;
        self.session
            .log
            .log(Level::Warn, "capture setup cancelled before completion");
    }
}
