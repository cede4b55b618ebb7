pub mod clock;
pub mod sample_queue;
