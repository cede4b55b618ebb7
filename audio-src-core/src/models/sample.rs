use std::sync::Arc;

use super::audio_models::{AudioFormat, StreamKind};
use super::time::{ClockTime, MediaTime};

/// A buffer of captured audio as delivered by the backend.
///
/// The payload is reference counted so it can be handed downstream without
/// copying. Samples are interleaved f32.
#[derive(Debug, Clone)]
pub struct CapturedSample {
    pub payload: Arc<[f32]>,
    pub pts: MediaTime,
    pub duration: MediaTime,
    pub num_samples: u64,
    pub channels: u16,
    pub kind: StreamKind,
}

impl CapturedSample {
    pub fn audio(payload: Arc<[f32]>, pts: MediaTime, duration: MediaTime, channels: u16) -> Self {
        let num_samples = if channels == 0 {
            0
        } else {
            (payload.len() / channels as usize) as u64
        };
        Self {
            payload,
            pts,
            duration,
            num_samples,
            channels,
            kind: StreamKind::Audio,
        }
    }

    /// Whether the sample can be turned into an output buffer.
    pub fn is_valid(&self) -> bool {
        self.pts.is_valid()
            && self.duration.is_valid()
            && self.channels > 0
            && self.num_samples > 0
            && self.payload.len() as u64 == self.num_samples * self.channels as u64
    }
}

/// Describes the audio layout of an output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMeta {
    pub format: AudioFormat,
    pub samples: u64,
}

/// Timestamped buffer handed to the pipeline.
///
/// `offset` and `offset_end` count samples since the last start.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    pub data: Arc<[f32]>,
    pub pts: ClockTime,
    pub duration: ClockTime,
    pub offset: u64,
    pub offset_end: u64,
    pub meta: AudioMeta,
}

impl OutputBuffer {
    pub fn num_samples(&self) -> u64 {
        self.offset_end - self.offset
    }

    pub fn size_bytes(&self) -> usize {
        self.meta.samples as usize * self.meta.format.bytes_per_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Arc<[f32]> {
        vec![0.0f32; len].into()
    }

    #[test]
    fn audio_counts_frames() {
        let sample = CapturedSample::audio(
            payload(960),
            MediaTime::new(0, 48_000),
            MediaTime::new(480, 48_000),
            2,
        );
        assert_eq!(sample.num_samples, 480);
        assert!(sample.is_valid());
    }

    #[test]
    fn invalid_samples() {
        let ok_pts = MediaTime::new(0, 48_000);
        let ok_dur = MediaTime::new(480, 48_000);

        let empty = CapturedSample::audio(payload(0), ok_pts, ok_dur, 2);
        assert!(!empty.is_valid());

        let bad_time = CapturedSample::audio(payload(960), MediaTime::new(0, 0), ok_dur, 2);
        assert!(!bad_time.is_valid());

        let mut torn = CapturedSample::audio(payload(960), ok_pts, ok_dur, 2);
        torn.num_samples = 500;
        assert!(!torn.is_valid());

        let no_channels = CapturedSample::audio(payload(960), ok_pts, ok_dur, 0);
        assert!(!no_channels.is_valid());
    }

    #[test]
    fn output_size_follows_meta() {
        let buffer = OutputBuffer {
            data: payload(960),
            pts: 0,
            duration: 10_000_000,
            offset: 0,
            offset_end: 480,
            meta: AudioMeta {
                format: AudioFormat::new(48_000, 2),
                samples: 480,
            },
        };
        assert_eq!(buffer.num_samples(), 480);
        assert_eq!(buffer.size_bytes(), 960 * 4);
    }
}
