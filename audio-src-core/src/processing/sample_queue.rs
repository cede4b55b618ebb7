use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::QueueBound;
use crate::models::sample::CapturedSample;

/// What happened to a pushed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest sample.
    DisplacedOldest,
    /// Not queued: the queue was cleared while the producer waited for space.
    Discarded,
}

#[derive(Debug, Default)]
struct QueueInner {
    samples: VecDeque<CapturedSample>,
    dropped: u64,
    /// Bumped by every `clear`.
    generation: u64,
}

/// FIFO hand-off between the backend delivery thread and the thread
/// producing output buffers.
///
/// One mutex guards the contents; `not_empty` wakes consumers and
/// `not_full` wakes producers held back by [`QueueBound::BlockProducer`].
/// Share it as `Arc<SampleQueue>`.
#[derive(Debug)]
pub struct SampleQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
    bound: QueueBound,
}

impl SampleQueue {
    pub fn new(bound: QueueBound) -> Self {
        // A zero capacity would make every push block or evict itself.
        let bound = match bound {
            QueueBound::DropOldest { capacity } => QueueBound::DropOldest {
                capacity: capacity.max(1),
            },
            QueueBound::BlockProducer { capacity } => QueueBound::BlockProducer {
                capacity: capacity.max(1),
            },
            QueueBound::Unbounded => QueueBound::Unbounded,
        };
        Self {
            inner: Mutex::new(QueueInner::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            bound,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(QueueBound::Unbounded)
    }

    /// Append a sample and wake one waiting consumer.
    ///
    /// Under `BlockProducer` this waits for space first, and gives the
    /// sample up if the queue is cleared meanwhile.
    pub fn push(&self, sample: CapturedSample) -> PushOutcome {
        let mut inner = self.inner.lock();
        let mut outcome = PushOutcome::Queued;

        match self.bound {
            QueueBound::Unbounded => {}
            QueueBound::DropOldest { capacity } => {
                while inner.samples.len() >= capacity {
                    inner.samples.pop_front();
                    inner.dropped += 1;
                    outcome = PushOutcome::DisplacedOldest;
                }
            }
            QueueBound::BlockProducer { capacity } => {
                let generation = inner.generation;
                while inner.samples.len() >= capacity {
                    self.not_full.wait(&mut inner);
                    if inner.generation != generation {
                        inner.dropped += 1;
                        return PushOutcome::Discarded;
                    }
                }
            }
        }

        inner.samples.push_back(sample);
        self.not_empty.notify_one();
        outcome
    }

    /// Remove the oldest sample, waiting as long as it takes for one.
    ///
    /// A concurrent [`clear`](Self::clear) does not end the wait.
    pub fn pop_blocking(&self) -> CapturedSample {
        let mut inner = self.inner.lock();
        loop {
            if let Some(sample) = inner.samples.pop_front() {
                self.not_full.notify_one();
                return sample;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Like [`pop_blocking`](Self::pop_blocking) but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<CapturedSample> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(sample) = inner.samples.pop_front() {
                self.not_full.notify_one();
                return Some(sample);
            }
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                return None;
            }
        }
    }

    /// Drop everything queued. Waiting consumers keep waiting; producers
    /// blocked on a full queue are released without queuing.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.samples.clear();
        inner.generation += 1;
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().samples.is_empty()
    }

    /// Samples evicted or discarded by the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub fn bound(&self) -> QueueBound {
        self.bound
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new(QueueBound::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::models::time::MediaTime;

    fn sample(tag: i64) -> CapturedSample {
        CapturedSample::audio(
            vec![0.0f32; 2].into(),
            MediaTime::new(tag, 48_000),
            MediaTime::new(1, 48_000),
            2,
        )
    }

    fn tag(sample: &CapturedSample) -> i64 {
        sample.pts.value
    }

    #[test]
    fn fifo_order() {
        let queue = SampleQueue::unbounded();
        queue.push(sample(1));
        queue.push(sample(2));
        queue.push(sample(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(tag(&queue.pop_blocking()), 1);
        assert_eq!(tag(&queue.pop_blocking()), 2);
        assert_eq!(tag(&queue.pop_blocking()), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_waits_for_push() {
        let queue = Arc::new(SampleQueue::unbounded());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                tx.send(tag(&queue.pop_blocking())).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        queue.push(sample(42));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        consumer.join().unwrap();
    }

    #[test]
    fn clear_does_not_satisfy_waiter() {
        let queue = Arc::new(SampleQueue::unbounded());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                tx.send(tag(&queue.pop_blocking())).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.clear();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        queue.push(sample(7));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        consumer.join().unwrap();
    }

    #[test]
    fn clear_empties_queue() {
        let queue = SampleQueue::unbounded();
        queue.push(sample(1));
        queue.push(sample(2));
        queue.push(sample(3));
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn drop_oldest_evicts_head() {
        let queue = SampleQueue::new(QueueBound::DropOldest { capacity: 2 });
        assert_eq!(queue.push(sample(1)), PushOutcome::Queued);
        assert_eq!(queue.push(sample(2)), PushOutcome::Queued);
        assert_eq!(queue.push(sample(3)), PushOutcome::DisplacedOldest);

        assert_eq!(queue.dropped(), 1);
        assert_eq!(tag(&queue.pop_blocking()), 2);
        assert_eq!(tag(&queue.pop_blocking()), 3);
    }

    #[test]
    fn block_producer_waits_for_space() {
        let queue = Arc::new(SampleQueue::new(QueueBound::BlockProducer { capacity: 1 }));
        queue.push(sample(1));

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.push(sample(2));
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(tag(&queue.pop_blocking()), 1);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();

        assert_eq!(tag(&queue.pop_blocking()), 2);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn clear_releases_blocked_producer() {
        let queue = Arc::new(SampleQueue::new(QueueBound::BlockProducer { capacity: 2 }));
        queue.push(sample(1));
        queue.push(sample(2));

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                tx.send(queue.push(sample(3))).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        queue.clear();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            PushOutcome::Discarded
        );
        producer.join().unwrap();

        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 1);

        // Pushes after the clear queue normally again.
        assert_eq!(queue.push(sample(4)), PushOutcome::Queued);
        assert_eq!(tag(&queue.pop_blocking()), 4);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let queue = SampleQueue::new(QueueBound::DropOldest { capacity: 0 });
        assert_eq!(queue.bound(), QueueBound::DropOldest { capacity: 1 });
        queue.push(sample(1));
        assert_eq!(tag(&queue.pop_blocking()), 1);
    }
}
