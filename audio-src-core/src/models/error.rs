use thiserror::Error;

/// Caps could not be turned into a usable `AudioFormat`.
///
/// Fatal for the `set_caps` call that produced it. An already running
/// capture is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("empty caps description")]
    Empty,

    #[error("unsupported media type: {0}")]
    MediaType(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("unsupported sample format: {0}")]
    SampleFormat(String),

    #[error("unsupported layout: {0}")]
    Layout(String),
}

/// Failures reported by, or on the way to, the capture backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("no capture target available")]
    NoCaptureTarget,

    #[error("no audio format configured")]
    NotConfigured,

    #[error("capture setup already in progress")]
    Busy,

    #[error("target enumeration failed: {0}")]
    Enumeration(String),

    #[error("session creation failed: {0}")]
    SessionCreation(String),

    #[error("configuration rejected: {0}")]
    Configuration(String),

    #[error("capture start failed: {0}")]
    Start(String),

    #[error("capture stop failed: {0}")]
    Stop(String),

    #[error("async bridge: {0}")]
    Bridge(String),
}

/// A buffer could not be stamped. Fails only the current buffer request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("pipeline has no clock")]
    NoPipelineClock,

    #[error("capture stream has no synchronization clock")]
    NoBackendClock,

    #[error("invalid native time")]
    InvalidTime,
}

/// Element-level error returned by the lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("dequeued sample is not valid")]
    InvalidSample,

    #[error("invalid configuration: {0}")]
    Configuration(String),
}
