//! Synthetic capture backend.
//!
//! Behaves like an OS screen/audio capture framework with a single display:
//! streams are created for a target, outputs are attached, and once started
//! a dedicated thread delivers interleaved f32 chunks to the audio outputs,
//! stamped with the backend's own monotonic clock. A running stream accepts
//! new configurations without restarting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use audio_src_core::models::audio_models::{
    CaptureTarget, StreamConfiguration, StreamKind, TargetKind,
};
use audio_src_core::models::error::BackendError;
use audio_src_core::models::sample::CapturedSample;
use audio_src_core::models::time::{scale_u64, ClockTime, MediaTime, SECOND};
use audio_src_core::traits::capture_backend::{CaptureBackend, SampleCallback};

use crate::tone::{Tone, ToneGenerator};

/// Settings of a [`SyntheticCaptureBackend`].
#[derive(Debug, Clone)]
pub struct SyntheticSettings {
    pub display_name: String,
    pub tone: Tone,
    /// Audio delivered per callback.
    pub chunk_duration: Duration,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            display_name: "Synthetic Display".into(),
            tone: Tone::default(),
            chunk_duration: Duration::from_millis(10),
        }
    }
}

/// Stream created by `create_session`, shared with the delivery thread.
struct Stream {
    config: StreamConfiguration,
    target_id: String,
    outputs: Vec<(SampleCallback, StreamKind)>,
}

pub struct SyntheticCaptureBackend {
    display: CaptureTarget,
    tone: Tone,
    chunk_duration: Duration,
    epoch: Instant,
    stream: Arc<Mutex<Option<Stream>>>,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SyntheticCaptureBackend {
    pub fn new(settings: SyntheticSettings) -> Self {
        Self {
            display: CaptureTarget {
                id: "synthetic-display-0".into(),
                name: settings.display_name,
                kind: TargetKind::Display,
            },
            tone: settings.tone,
            chunk_duration: settings.chunk_duration.max(Duration::from_millis(1)),
            epoch: Instant::now(),
            stream: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Configuration of the current stream.
    pub fn stream_configuration(&self) -> Option<StreamConfiguration> {
        self.stream.lock().as_ref().map(|s| s.config)
    }

    /// Id of the target the current stream captures.
    pub fn stream_target(&self) -> Option<String> {
        self.stream.lock().as_ref().map(|s| s.target_id.clone())
    }

    fn check_target(&self, target: &CaptureTarget) -> Result<(), String> {
        if target.id == self.display.id {
            Ok(())
        } else {
            Err(format!("unknown capture target '{}'", target.id))
        }
    }

    /// Signal the delivery thread and wait for it to exit.
    fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                log::error!("synthetic capture thread panicked");
            }
        }
    }

    /// [`halt`](Self::halt) for async callers: the join runs on the
    /// blocking pool so runtime workers stay free.
    async fn halt_async(&self) -> Result<(), BackendError> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.capture_handle.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                log::error!("synthetic capture thread panicked");
                Ok(())
            }
            Err(e) => Err(BackendError::Stop(format!("join task failed: {}", e))),
        }
    }
}

impl Default for SyntheticCaptureBackend {
    fn default() -> Self {
        Self::new(SyntheticSettings::default())
    }
}

impl Drop for SyntheticCaptureBackend {
    fn drop(&mut self) {
        self.halt();
    }
}

#[async_trait]
impl CaptureBackend for SyntheticCaptureBackend {
    async fn enumerate_targets(&self) -> Result<Vec<CaptureTarget>, BackendError> {
        Ok(vec![self.display.clone()])
    }

    async fn create_session(
        &self,
        target: &CaptureTarget,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError> {
        self.check_target(target).map_err(BackendError::SessionCreation)?;
        validate(config).map_err(BackendError::SessionCreation)?;

        // A new stream replaces the old one, which must not keep delivering.
        self.halt_async().await?;
        *self.stream.lock() = Some(Stream {
            config: *config,
            target_id: target.id.clone(),
            outputs: Vec::new(),
        });
        log::debug!(
            "synthetic stream created for {} ({} Hz, {} ch)",
            target.name,
            config.sample_rate,
            config.channel_count
        );
        Ok(())
    }

    fn add_stream_output(
        &self,
        callback: SampleCallback,
        kind: StreamKind,
    ) -> Result<(), BackendError> {
        let mut stream = self.stream.lock();
        let stream = stream.as_mut().ok_or(BackendError::NotConfigured)?;
        stream.outputs.push((callback, kind));
        Ok(())
    }

    async fn update_configuration(
        &self,
        config: &StreamConfiguration,
    ) -> Result<(), BackendError> {
        validate(config).map_err(BackendError::Configuration)?;
        let mut stream = self.stream.lock();
        let stream = stream.as_mut().ok_or(BackendError::NotConfigured)?;
        stream.config = *config;
        log::debug!(
            "synthetic stream reconfigured ({} Hz, {} ch)",
            config.sample_rate,
            config.channel_count
        );
        Ok(())
    }

    async fn update_content_filter(&self, target: &CaptureTarget) -> Result<(), BackendError> {
        self.check_target(target).map_err(BackendError::Configuration)?;
        let mut stream = self.stream.lock();
        let stream = stream.as_mut().ok_or(BackendError::NotConfigured)?;
        stream.target_id = target.id.clone();
        Ok(())
    }

    async fn start_capture(&self) -> Result<(), BackendError> {
        if self.stream.lock().is_none() {
            return Err(BackendError::NotConfigured);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BackendError::Start("synthetic capture already running".into()));
        }

        let delivery = Delivery {
            stream: Arc::clone(&self.stream),
            running: Arc::clone(&self.running),
            generator: ToneGenerator::new(self.tone),
            chunk_duration: self.chunk_duration,
            epoch: self.epoch,
        };

        let handle = thread::Builder::new()
            .name("synthetic-audio-capture".into())
            .spawn(move || delivery.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                BackendError::Start(format!("failed to spawn capture thread: {}", e))
            })?;

        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    async fn stop_capture(&self) -> Result<(), BackendError> {
        if !self.is_running() {
            return Err(BackendError::Stop("synthetic capture is not running".into()));
        }
        self.halt_async().await
    }

    fn synchronization_clock(&self) -> Option<MediaTime> {
        self.stream
            .lock()
            .as_ref()
            .map(|_| MediaTime::from_nanos(elapsed_nanos(self.epoch)))
    }
}

fn validate(config: &StreamConfiguration) -> Result<(), String> {
    if config.sample_rate == 0 || i32::try_from(config.sample_rate).is_err() {
        return Err(format!("unsupported sample rate {}", config.sample_rate));
    }
    if config.channel_count == 0 {
        return Err("channel count must be positive".into());
    }
    Ok(())
}

fn elapsed_nanos(epoch: Instant) -> ClockTime {
    epoch.elapsed().as_nanos() as ClockTime
}

/// State owned by the delivery thread.
struct Delivery {
    stream: Arc<Mutex<Option<Stream>>>,
    running: Arc<AtomicBool>,
    generator: ToneGenerator,
    chunk_duration: Duration,
    epoch: Instant,
}

impl Delivery {
    /// Deliver one chunk per `chunk_duration` until told to stop.
    fn run(mut self) {
        let mut next = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            next += self.chunk_duration;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            }

            // Snapshot so callbacks run without the stream lock held.
            let snapshot = self.stream.lock().as_ref().map(|s| {
                let audio: Vec<SampleCallback> = s
                    .outputs
                    .iter()
                    .filter(|(_, kind)| *kind == StreamKind::Audio)
                    .map(|(cb, _)| Arc::clone(cb))
                    .collect();
                (s.config, audio)
            });
            let Some((config, outputs)) = snapshot else {
                break;
            };
            if !config.captures_audio || outputs.is_empty() {
                continue;
            }

            let sample = self.next_sample(&config);
            for output in &outputs {
                output(sample.clone(), StreamKind::Audio);
            }
        }
        self.running.store(false, Ordering::SeqCst);
        log::debug!("synthetic capture thread exiting");
    }

    fn next_sample(&mut self, config: &StreamConfiguration) -> CapturedSample {
        let rate = config.sample_rate;
        let chunk_nanos = self.chunk_duration.as_nanos() as u64;
        let frames = scale_u64(chunk_nanos, rate as u64, SECOND).unwrap_or(0).max(1);

        let payload = self.generator.render(rate, config.channel_count, frames as usize);

        // The chunk ends now; its first frame was captured `frames` ago.
        let span = scale_u64(frames, SECOND, rate as u64).unwrap_or(chunk_nanos);
        let pts = elapsed_nanos(self.epoch).saturating_sub(span);

        CapturedSample::audio(
            payload.into(),
            MediaTime::from_nanos(pts),
            MediaTime::new(frames as i64, rate as i32),
            config.channel_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use audio_src_core::bridge::{BlockingBridge, BridgeError};
    use audio_src_core::models::audio_models::AudioFormat;

    use super::*;

    fn bridge() -> BlockingBridge {
        BlockingBridge::new(1, Some(Duration::from_secs(5))).unwrap()
    }

    fn stereo() -> StreamConfiguration {
        StreamConfiguration::for_audio(AudioFormat::new(48_000, 2), true)
    }

    type Collected = Arc<Mutex<Vec<CapturedSample>>>;

    fn collector() -> (SampleCallback, Collected) {
        let collected: Collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let callback: SampleCallback = Arc::new(move |sample: CapturedSample, _kind: StreamKind| {
            sink.lock().push(sample);
        });
        (callback, collected)
    }

    fn wait_for(collected: &Collected, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while collected.lock().len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for samples");
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Create, attach a collecting audio output, and start.
    fn running_backend(
        bridge: &BlockingBridge,
        config: StreamConfiguration,
    ) -> (Arc<SyntheticCaptureBackend>, Collected) {
        let (callback, collected) = collector();
        (start_with(bridge, config, callback), collected)
    }

    fn start_with(
        bridge: &BlockingBridge,
        config: StreamConfiguration,
        callback: SampleCallback,
    ) -> Arc<SyntheticCaptureBackend> {
        let backend = Arc::new(SyntheticCaptureBackend::default());

        let b = Arc::clone(&backend);
        bridge
            .run(async move {
                let target = b.enumerate_targets().await?.remove(0);
                b.create_session(&target, &config).await?;
                b.add_stream_output(callback, StreamKind::Audio)?;
                b.start_capture().await
            })
            .unwrap();
        backend
    }

    #[test]
    fn enumerates_single_display() {
        let backend = Arc::new(SyntheticCaptureBackend::default());
        let b = Arc::clone(&backend);
        let targets = bridge().run(async move { b.enumerate_targets().await }).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kind, TargetKind::Display);
        assert_eq!(targets[0].name, "Synthetic Display");
    }

    #[test]
    fn delivers_valid_ten_millisecond_chunks() {
        let bridge = bridge();
        let (backend, collected) = running_backend(&bridge, stereo());
        wait_for(&collected, 3);

        let b = Arc::clone(&backend);
        bridge.run(async move { b.stop_capture().await }).unwrap();

        for sample in collected.lock().iter() {
            assert!(sample.is_valid());
            assert_eq!(sample.channels, 2);
            assert_eq!(sample.num_samples, 480);
            assert_eq!(sample.duration.to_nanos(), Some(10_000_000));
        }
    }

    #[test]
    fn timestamps_trail_the_stream_clock() {
        let bridge = bridge();
        let (backend, collected) = running_backend(&bridge, stereo());
        wait_for(&collected, 2);

        let now = backend.synchronization_clock().and_then(|t| t.to_nanos()).unwrap();
        let samples = collected.lock().clone();
        let first = samples[0].pts.to_nanos().unwrap();
        let second = samples[1].pts.to_nanos().unwrap();
        assert!(first < second);
        assert!(second <= now);

        let b = Arc::clone(&backend);
        bridge.run(async move { b.stop_capture().await }).unwrap();
    }

    #[test]
    fn reconfigures_without_restart() {
        let bridge = bridge();
        let (backend, collected) = running_backend(&bridge, stereo());
        wait_for(&collected, 1);

        let mono = StreamConfiguration::for_audio(AudioFormat::new(16_000, 1), true);
        let b = Arc::clone(&backend);
        bridge.run(async move { b.update_configuration(&mono).await }).unwrap();
        assert!(backend.is_running());
        assert_eq!(backend.stream_configuration(), Some(mono));
        assert_eq!(backend.stream_target().as_deref(), Some("synthetic-display-0"));

        collected.lock().clear();
        wait_for(&collected, 2);
        let last = collected.lock().last().cloned().unwrap();
        assert_eq!(last.channels, 1);
        assert_eq!(last.num_samples, 160);

        let b = Arc::clone(&backend);
        bridge.run(async move { b.stop_capture().await }).unwrap();
    }

    #[test]
    fn stop_joins_delivery_thread() {
        let bridge = bridge();
        let (backend, collected) = running_backend(&bridge, stereo());
        wait_for(&collected, 1);

        let b = Arc::clone(&backend);
        bridge.run(async move { b.stop_capture().await }).unwrap();
        assert!(!backend.is_running());

        let delivered = collected.lock().len();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(collected.lock().len(), delivered);

        let b = Arc::clone(&backend);
        let again = bridge.run(async move { b.stop_capture().await });
        assert!(again.is_err());
    }

    #[test]
    fn stop_keeps_runtime_worker_free() {
        let bridge = Arc::new(bridge());
        let entered = Arc::new(AtomicBool::new(false));

        // The first callback stalls the delivery thread.
        let flag = Arc::clone(&entered);
        let slow: SampleCallback = Arc::new(move |_sample: CapturedSample, _kind: StreamKind| {
            if !flag.swap(true, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(300));
            }
        });
        let backend = start_with(&bridge, stereo(), slow);
        while !entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        let stopper = {
            let bridge = Arc::clone(&bridge);
            let b = Arc::clone(&backend);
            thread::spawn(move || bridge.run(async move { b.stop_capture().await }))
        };
        thread::sleep(Duration::from_millis(20));

        // The single worker answers while the join is still pending.
        let started = Instant::now();
        let quick: Result<u8, BridgeError<()>> = bridge.run(async { Ok(1) });
        assert_eq!(quick, Ok(1));
        assert!(started.elapsed() < Duration::from_millis(150));

        stopper.join().unwrap().unwrap();
        assert!(!backend.is_running());
    }

    #[test]
    fn screen_outputs_get_nothing() {
        let bridge = bridge();
        let backend = Arc::new(SyntheticCaptureBackend::default());
        let (callback, collected) = collector();

        let b = Arc::clone(&backend);
        bridge
            .run(async move {
                let target = b.enumerate_targets().await?.remove(0);
                b.create_session(&target, &stereo()).await?;
                b.add_stream_output(callback, StreamKind::Screen)?;
                b.start_capture().await
            })
            .unwrap();

        thread::sleep(Duration::from_millis(40));
        assert!(collected.lock().is_empty());

        let b = Arc::clone(&backend);
        bridge.run(async move { b.stop_capture().await }).unwrap();
    }

    #[test]
    fn start_requires_a_stream() {
        let backend = Arc::new(SyntheticCaptureBackend::default());
        assert!(backend.synchronization_clock().is_none());

        let b = Arc::clone(&backend);
        let result = bridge().run(async move { b.start_capture().await });
        assert!(matches!(result, Err(BridgeError::Failed(BackendError::NotConfigured))));
    }

    #[test]
    fn rejects_unknown_target() {
        let backend = Arc::new(SyntheticCaptureBackend::default());
        let target = CaptureTarget {
            id: "elsewhere".into(),
            name: "Elsewhere".into(),
            kind: TargetKind::Display,
        };
        let b = Arc::clone(&backend);
        let result = bridge().run(async move { b.create_session(&target, &stereo()).await });
        assert!(result.is_err());
        assert!(backend.stream_configuration().is_none());
    }
}
