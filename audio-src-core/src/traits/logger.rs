use log::Level;
use parking_lot::Mutex;

/// Log target used by [`LogCrateSink`].
pub const LOG_TARGET: &str = "audio_src";

/// Logging capability injected into every component.
///
/// Components never log through global state; whoever builds them decides
/// where messages go.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Keeps every message in memory. Useful for asserting on log output.
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().clone()
    }

    /// Whether any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }
}

impl LogSink for RecordingLogSink {
    fn log(&self, level: Level, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}
