//! Sine tone generation.

use std::f64::consts::TAU;

/// Tone the synthetic backend plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Peak amplitude, 0.0..=1.0.
    pub amplitude: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            amplitude: 0.25,
        }
    }
}

/// Stateful oscillator producing interleaved f32 frames.
///
/// Phase is carried across calls, so consecutive chunks join without
/// discontinuity even when the sample rate changes between them.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    tone: Tone,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(tone: Tone) -> Self {
        Self { tone, phase: 0.0 }
    }

    /// Render `frames` frames, the same value on every channel.
    pub fn render(&mut self, sample_rate: u32, channels: u16, frames: usize) -> Vec<f32> {
        let step = TAU * self.tone.frequency / sample_rate.max(1) as f64;
        let mut out = Vec::with_capacity(frames * channels as usize);

        for _ in 0..frames {
            let value = self.tone.amplitude * self.phase.sin() as f32;
            out.extend(std::iter::repeat(value).take(channels as usize));
            self.phase = (self.phase + step) % TAU;
        }
        out
    }
}
