//! The live audio source element.
//!
//! Implements the synchronous source lifecycle on top of an async capture
//! backend:
//!
//! ```text
//! pipeline thread ── set_caps/create/stop ──► AudioSourceElement
//!                                               │  BlockingBridge
//!                                               ▼
//!                                          CaptureSession ──► CaptureBackend
//!                                               ▲                  │
//!            pop_blocking ◄── SampleQueue ◄── sink ◄───────────────┘ (backend thread)
//! ```

use std::sync::Arc;

use log::Level;

use crate::bridge::{BlockingBridge, BridgeError};
use crate::models::audio_models::AudioFormat;
use crate::models::config::SourceConfiguration;
use crate::models::error::{BackendError, SourceError};
use crate::models::sample::{AudioMeta, OutputBuffer};
use crate::models::state::CaptureState;
use crate::models::time::{ClockTime, MediaTime};
use crate::processing::clock::ClockReconciler;
use crate::processing::sample_queue::SampleQueue;
use crate::session::capture::CaptureSession;
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::live_source::{FlowReturn, Format, LiveSource};
use crate::traits::logger::LogSink;
use crate::traits::pipeline_clock::PipelineClock;

pub struct AudioSourceElement {
    session: CaptureSession,
    bridge: BlockingBridge,
    reconciler: ClockReconciler,
    clock: Option<Arc<dyn PipelineClock>>,
    base_time: ClockTime,
    first_buffer_pts: Option<MediaTime>,
    total_samples: u64,
    /// Queue overflow count already reported.
    reported_drops: u64,
    log: Arc<dyn LogSink>,
}

impl AudioSourceElement {
    /// Element with its own bridge runtime, sized by `config`.
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        config: SourceConfiguration,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, SourceError> {
        config.validate().map_err(SourceError::Configuration)?;
        let bridge = BlockingBridge::new(config.bridge_worker_threads, config.bridge_timeout)
            .map_err(|e| {
                SourceError::Configuration(format!("failed to build bridge runtime: {}", e))
            })?;
        Self::with_bridge(backend, config, bridge, log)
    }

    /// Element driving the backend through an existing bridge.
    ///
    /// `config.bridge_timeout` and `config.bridge_worker_threads` are ignored;
    /// the bridge brings its own.
    pub fn with_bridge(
        backend: Arc<dyn CaptureBackend>,
        config: SourceConfiguration,
        bridge: BlockingBridge,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, SourceError> {
        config.validate().map_err(SourceError::Configuration)?;

        let queue = Arc::new(SampleQueue::new(config.queue_bound));
        let session = CaptureSession::new(backend, queue, Arc::clone(&log));
        session.set_exclude_current_process_audio(config.exclude_current_process_audio);

        Ok(Self {
            session,
            bridge,
            reconciler: ClockReconciler::new(Arc::clone(&log)),
            clock: None,
            base_time: 0,
            first_buffer_pts: None,
            total_samples: 0,
            reported_drops: 0,
            log,
        })
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    pub fn set_clock(&mut self, clock: Option<Arc<dyn PipelineClock>>) {
        self.clock = clock;
    }

    pub fn set_base_time(&mut self, base_time: ClockTime) {
        self.base_time = base_time;
    }

    pub fn exclude_current_process_audio(&self) -> bool {
        self.session.exclude_current_process_audio()
    }

    pub fn set_exclude_current_process_audio(&mut self, exclude: bool) {
        self.session.set_exclude_current_process_audio(exclude);
    }

    /// Native pts of the first buffer produced since the last stop.
    pub fn first_buffer_pts(&self) -> Option<MediaTime> {
        self.first_buffer_pts
    }

    /// Samples handed downstream since the last start.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Reset sample accounting. Capture itself starts lazily.
    pub fn on_start(&mut self) {
        self.total_samples = 0;
        self.log.log(
            Level::Debug,
            "started, capture begins on caps or first buffer request",
        );
    }

    /// Accept new caps and (re)configure capture for them.
    ///
    /// Unparseable caps leave the element untouched.
    pub fn on_set_format(&mut self, caps: &str) -> Result<AudioFormat, SourceError> {
        let format = AudioFormat::from_caps(caps).map_err(|e| {
            self.log.log(
                Level::Error,
                &format!("couldn't parse audio info from caps '{}': {}", caps, e),
            );
            e
        })?;

        self.log.log(Level::Debug, &format!("configuring capture for {}", format));
        self.session.configure(format);
        self.ensure_started()?;
        Ok(format)
    }

    /// Produce the next buffer, blocking until the backend delivers one.
    ///
    /// The hints are accepted but unused: buffer size follows the backend's
    /// own batching.
    pub fn on_request_buffer(
        &mut self,
        offset_hint: u64,
        size_hint: u32,
    ) -> Result<OutputBuffer, SourceError> {
        self.log.log(
            Level::Debug,
            &format!("create called (offset {}, size {})", offset_hint, size_hint),
        );

        if !self.session.state().is_active() {
            self.ensure_started()?;
        }

        let sample = self.session.queue().pop_blocking();
        if !sample.is_valid() {
            self.log.log(Level::Error, "failed to get a valid sample buffer");
            return Err(SourceError::InvalidSample);
        }

        // Offsets stay contiguous across overflow drops; say so when it happens.
        let dropped = self.session.queue().dropped();
        if dropped > self.reported_drops {
            self.log.log(
                Level::Warn,
                &format!(
                    "sample queue overflow dropped {} samples ({} total), stream has a gap",
                    dropped - self.reported_drops,
                    dropped
                ),
            );
            self.reported_drops = dropped;
        }

        if self.first_buffer_pts.is_none() {
            self.first_buffer_pts = Some(sample.pts);
        }

        let negotiated = self.session.format().ok_or(BackendError::NotConfigured)?;
        let format = if sample.channels == negotiated.channels {
            negotiated
        } else {
            self.log.log(
                Level::Warn,
                &format!(
                    "sample has {} channels, negotiated {}; describing buffer by the sample",
                    sample.channels, negotiated.channels
                ),
            );
            AudioFormat::new(negotiated.rate, sample.channels)
        };

        let backend_now = self.session.synchronization_clock();
        let timing = self
            .reconciler
            .stamp(&sample, backend_now, self.clock.as_deref(), self.base_time)?;

        let offset = self.total_samples;
        self.total_samples += sample.num_samples;

        Ok(OutputBuffer {
            data: sample.payload,
            pts: timing.pts,
            duration: timing.duration,
            offset,
            offset_end: self.total_samples,
            meta: AudioMeta {
                format,
                samples: sample.num_samples,
            },
        })
    }

    /// Tear capture down. Teardown problems are logged, never reported.
    pub fn on_stop(&mut self) {
        let session = self.session.clone();
        let result = self.bridge.run(async move {
            session.stop().await;
            Ok::<(), BackendError>(())
        });
        if let Err(e) = result {
            self.log.log(Level::Warn, &format!("stop did not complete: {}", e));
        }
        self.first_buffer_pts = None;
        self.reported_drops = self.session.queue().dropped();
    }

    fn ensure_started(&self) -> Result<(), BackendError> {
        let session = self.session.clone();
        self.bridge
            .run(async move { session.ensure_started().await })
            .map_err(|e| match e {
                BridgeError::Failed(e) => e,
                BridgeError::Timeout => BackendError::Bridge("capture setup timed out".into()),
                BridgeError::Aborted => BackendError::Bridge("capture setup aborted".into()),
            })
    }
}

impl LiveSource for AudioSourceElement {
    fn is_live(&self) -> bool {
        true
    }

    fn format(&self) -> Format {
        Format::Time
    }

    fn start(&mut self) -> bool {
        self.on_start();
        true
    }

    fn stop(&mut self) -> bool {
        self.on_stop();
        true
    }

    fn set_caps(&mut self, caps: &str) -> bool {
        match self.on_set_format(caps) {
            Ok(_) => true,
            Err(e) => {
                self.log.log(Level::Error, &format!("set_caps failed: {}", e));
                false
            }
        }
    }

    fn create(&mut self, offset: u64, size: u32) -> (FlowReturn, Option<OutputBuffer>) {
        match self.on_request_buffer(offset, size) {
            Ok(buffer) => (FlowReturn::Ok, Some(buffer)),
            Err(e) => {
                self.log.log(Level::Error, &format!("create failed: {}", e));
                (FlowReturn::Error, None)
            }
        }
    }
}

impl Drop for AudioSourceElement {
    fn drop(&mut self) {
        if self.session.state().is_idle() {
            return;
        }
        // Blocking on the bridge from inside a runtime would panic. The
        // backend stream is left to the backend's own teardown.
        if tokio::runtime::Handle::try_current().is_ok() {
            self.log.log(
                Level::Warn,
                "element dropped inside async context with capture running",
            );
            return;
        }
        self.on_stop();
    }
}
