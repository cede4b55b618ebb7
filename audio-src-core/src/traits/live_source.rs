use crate::models::sample::OutputBuffer;

/// Outcome of a buffer request as seen by the host pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowReturn {
    Ok,
    Error,
}

/// Unit the source reports its segment in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bytes,
    Time,
}

/// Synchronous lifecycle a pull-based pipeline drives a source through.
///
/// Every call runs on the pipeline's streaming thread and may block.
pub trait LiveSource {
    fn is_live(&self) -> bool;

    fn format(&self) -> Format;

    fn start(&mut self) -> bool;

    fn stop(&mut self) -> bool;

    /// Negotiate caps. Returns false if they are rejected.
    fn set_caps(&mut self, caps: &str) -> bool;

    /// Produce the next buffer. `offset` and `size` are hints only.
    fn create(&mut self, offset: u64, size: u32) -> (FlowReturn, Option<OutputBuffer>);
}
