use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the sample queue behaves once it holds `capacity` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum QueueBound {
    /// Grow without limit.
    Unbounded,
    /// Evict the oldest queued sample to make room.
    DropOldest { capacity: usize },
    /// Block the delivering thread until a sample is consumed.
    BlockProducer { capacity: usize },
}

impl QueueBound {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::DropOldest { capacity } | Self::BlockProducer { capacity } => Some(*capacity),
        }
    }
}

impl Default for QueueBound {
    /// Lossless: every delivered sample reaches the consumer.
    fn default() -> Self {
        Self::Unbounded
    }
}

/// Configuration for an audio source element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfiguration {
    /// Keep audio played by this process out of the capture (default: true).
    pub exclude_current_process_audio: bool,

    /// Bound and overflow policy of the sample queue.
    pub queue_bound: QueueBound,

    /// Upper limit for a single bridged lifecycle operation (None = wait forever).
    #[serde(with = "optional_millis")]
    pub bridge_timeout: Option<Duration>,

    /// Worker threads of the runtime driving backend operations (default: 1).
    pub bridge_worker_threads: usize,
}

impl SourceConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_bound.capacity() == Some(0) {
            return Err("queue capacity must be positive".into());
        }
        if self.bridge_timeout == Some(Duration::ZERO) {
            return Err("bridge timeout must be positive".into());
        }
        if self.bridge_worker_threads == 0 {
            return Err("bridge needs at least one worker thread".into());
        }
        Ok(())
    }
}

impl Default for SourceConfiguration {
    fn default() -> Self {
        Self {
            exclude_current_process_audio: true,
            queue_bound: QueueBound::default(),
            bridge_timeout: None,
            bridge_worker_threads: 1,
        }
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
