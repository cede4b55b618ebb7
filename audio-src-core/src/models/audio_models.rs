use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest channel count accepted from caps.
pub const MAX_CHANNELS: u16 = 64;

/// Negotiated audio format of the source pad.
///
/// Samples are always 32-bit float, little-endian, interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const SAMPLE_FORMAT: &'static str = "F32LE";
    pub const LAYOUT: &'static str = "interleaved";

    pub fn new(rate: u32, channels: u16) -> Self {
        Self { rate, channels }
    }

    /// Bytes per frame (one sample for every channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * std::mem::size_of::<f32>()
    }

    /// Caps description for this format.
    pub fn to_caps(&self) -> String {
        format!(
            "audio/x-raw, format={}, layout={}, rate={}, channels={}",
            Self::SAMPLE_FORMAT,
            Self::LAYOUT,
            self.rate,
            self.channels
        )
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} ch", self.rate, self.channels)
    }
}

/// Kind of stream a backend delivers samples for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Screen,
}

/// Kind of content a capture target represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Display,
    Window,
    Application,
}

/// Something the backend can capture from, as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    pub id: String,
    pub name: String,
    pub kind: TargetKind,
}

/// Backend stream configuration built from the negotiated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfiguration {
    pub captures_audio: bool,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub excludes_current_process_audio: bool,
}

impl StreamConfiguration {
    pub fn for_audio(format: AudioFormat, exclude_current_process_audio: bool) -> Self {
        Self {
            captures_audio: true,
            sample_rate: format.rate,
            channel_count: format.channels,
            excludes_current_process_audio: exclude_current_process_audio,
        }
    }
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub samples_delivered: u64,
    pub foreign_kind_dropped: u64,
    pub detached_dropped: u64,
    pub fresh_starts: u64,
    pub reconfigurations: u64,
}
