//! Mapping of backend timestamps into pipeline running time.
//!
//! The backend stamps samples with its own synchronization clock, whose
//! epoch has nothing to do with the pipeline clock. Instead of relating the
//! two epochs, every sample is aged against the backend clock ("how long ago
//! was this captured") and that age is subtracted from the current running
//! time.

use std::sync::Arc;

use log::Level;

use crate::models::error::ClockError;
use crate::models::sample::CapturedSample;
use crate::models::time::{ClockTime, MediaTime};
use crate::traits::logger::LogSink;
use crate::traits::pipeline_clock::PipelineClock;

/// Timestamp and duration of an output buffer, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTiming {
    pub pts: ClockTime,
    pub duration: ClockTime,
}

/// Running time at `clock_time` for an element started at `base_time`.
pub fn running_time(clock_time: ClockTime, base_time: ClockTime) -> ClockTime {
    clock_time.saturating_sub(base_time)
}

/// Shifts `running_time` back by the sample's age.
///
/// Falls back to `running_time` itself when the age exceeds it, which
/// happens right after start when the skew cannot be trusted yet.
pub fn timestamp_from_skew(running_time: ClockTime, clock_skew: ClockTime) -> ClockTime {
    if running_time >= clock_skew {
        running_time - clock_skew
    } else {
        running_time
    }
}

pub struct ClockReconciler {
    log: Arc<dyn LogSink>,
}

impl ClockReconciler {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self { log }
    }

    /// Compute pts and duration for `sample`.
    ///
    /// `backend_now` is the backend synchronization clock read just before
    /// the call; `pipeline_clock` and `base_time` come from the element.
    pub fn stamp(
        &self,
        sample: &CapturedSample,
        backend_now: Option<MediaTime>,
        pipeline_clock: Option<&dyn PipelineClock>,
        base_time: ClockTime,
    ) -> Result<SampleTiming, ClockError> {
        let Some(pipeline_clock) = pipeline_clock else {
            self.log.log(Level::Error, "couldn't get pipeline clock");
            return Err(ClockError::NoPipelineClock);
        };
        let Some(backend_now) = backend_now else {
            self.log.log(Level::Error, "couldn't get capture stream clock");
            return Err(ClockError::NoBackendClock);
        };

        let sample_pts = self.to_nanos(sample.pts, "sample pts")?;
        let duration = self.to_nanos(sample.duration, "sample duration")?;
        let now = self.to_nanos(backend_now, "stream clock")?;

        // A sample stamped ahead of the stream clock is treated as brand new.
        let clock_skew = now.saturating_sub(sample_pts);
        let running = running_time(pipeline_clock.time(), base_time);
        let pts = timestamp_from_skew(running, clock_skew);

        self.log.log(
            Level::Trace,
            &format!("running time {running} skew {clock_skew} -> pts {pts} duration {duration}"),
        );

        Ok(SampleTiming { pts, duration })
    }

    fn to_nanos(&self, time: MediaTime, what: &str) -> Result<ClockTime, ClockError> {
        time.to_nanos().ok_or_else(|| {
            self.log.log(
                Level::Error,
                &format!("invalid {what}: {}/{}", time.value, time.timescale),
            );
            ClockError::InvalidTime
        })
    }
}
