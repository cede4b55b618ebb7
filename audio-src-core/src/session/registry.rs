use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_models::{SessionDiagnostics, StreamKind};
use crate::models::sample::CapturedSample;
use crate::processing::sample_queue::{PushOutcome, SampleQueue};

/// Handle a backend sink uses to find the queue it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of handing a sample to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued(PushOutcome),
    /// The sample is of a kind the registration does not want.
    ForeignKind,
    /// The registration was retired; the sample came in late.
    Detached,
}

struct Registration {
    queue: Arc<SampleQueue>,
    kind: StreamKind,
}

/// Live sink registrations of a capture session.
///
/// Backend sinks hold a `Weak` reference to the registry plus their
/// [`SessionId`]; they never own the queue. Once a registration is retired
/// (or the registry is gone) samples arriving through that sink are dropped.
#[derive(Default)]
pub struct SessionRegistry {
    live: Mutex<HashMap<SessionId, Registration>>,
    diagnostics: Mutex<SessionDiagnostics>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, queue: Arc<SampleQueue>, kind: StreamKind) -> SessionId {
        let id = SessionId::new();
        self.live.lock().insert(id, Registration { queue, kind });
        id
    }

    /// Returns false if `id` was not live.
    pub fn retire(&self, id: SessionId) -> bool {
        self.live.lock().remove(&id).is_some()
    }

    pub fn is_live(&self, id: SessionId) -> bool {
        self.live.lock().contains_key(&id)
    }

    pub fn deliver(&self, id: SessionId, sample: CapturedSample, kind: StreamKind) -> Delivery {
        let registration = self
            .live
            .lock()
            .get(&id)
            .map(|reg| (reg.kind == kind, Arc::clone(&reg.queue)));

        let queue = match registration {
            None => {
                self.diagnostics.lock().detached_dropped += 1;
                return Delivery::Detached;
            }
            Some((false, _)) => {
                self.diagnostics.lock().foreign_kind_dropped += 1;
                return Delivery::ForeignKind;
            }
            Some((true, queue)) => queue,
        };

        // Pushing may block under BlockProducer, so the registry lock is
        // already released here.
        let outcome = queue.push(sample);
        self.diagnostics.lock().samples_delivered += 1;
        Delivery::Queued(outcome)
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        *self.diagnostics.lock()
    }

    pub fn record(&self, update: impl FnOnce(&mut SessionDiagnostics)) {
        update(&mut self.diagnostics.lock());
    }
}
