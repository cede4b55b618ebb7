pub mod capture_backend;
pub mod live_source;
pub mod logger;
pub mod pipeline_clock;
