//! Blocking execution of async work for synchronous callers.
//!
//! The pipeline calls into the element from plain threads that must not
//! return before capture setup or teardown has finished, while the backend
//! API is async. [`BlockingBridge::run`] spawns the operation onto a tokio
//! runtime and parks the calling thread on a one-shot channel until the task
//! reports back. Runtime workers are never blocked by callers, so any number
//! of threads can wait at once.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;

/// Why a bridged operation produced no value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError<E> {
    /// The operation itself returned an error.
    #[error("{0}")]
    Failed(E),

    /// The operation did not finish in time and was cancelled.
    #[error("operation timed out")]
    Timeout,

    /// The task went away without reporting (panic or runtime shutdown).
    #[error("operation aborted")]
    Aborted,
}

pub struct BlockingBridge {
    handle: Handle,
    /// Set when the bridge built its own runtime.
    runtime: Option<Runtime>,
    timeout: Option<Duration>,
}

impl BlockingBridge {
    /// Bridge backed by its own multi-threaded runtime.
    pub fn new(worker_threads: usize, timeout: Option<Duration>) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("audio-src-bridge")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            timeout,
        })
    }

    /// Bridge spawning onto an existing runtime. The runtime needs its time
    /// driver enabled if `timeout` is set.
    pub fn with_handle(handle: Handle, timeout: Option<Duration>) -> Self {
        Self {
            handle,
            runtime: None,
            timeout,
        }
    }

    /// Run `operation` to completion and return its result.
    ///
    /// Blocks the calling thread for the whole run. On timeout the future is
    /// dropped, which cancels it at its current await point.
    ///
    /// # Panics
    ///
    /// When called from within an async execution context.
    pub fn run<F, T, E>(&self, operation: F) -> Result<T, BridgeError<E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let timeout = self.timeout;

        self.handle.spawn(async move {
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, operation).await {
                    Ok(result) => result.map_err(BridgeError::Failed),
                    Err(_) => Err(BridgeError::Timeout),
                },
                None => operation.await.map_err(BridgeError::Failed),
            };
            // The receiver only disappears if the caller thread died.
            let _ = tx.send(outcome);
        });

        rx.blocking_recv().unwrap_or(Err(BridgeError::Aborted))
    }
}

impl Drop for BlockingBridge {
    fn drop(&mut self) {
        // Dropping a runtime from within an async context panics.
        if Handle::try_current().is_ok() {
            if let Some(runtime) = self.runtime.take() {
                runtime.shutdown_background();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    async fn explode() -> Result<(), ()> {
        panic!("backend blew up")
    }

    #[test]
    fn falsy_value_is_not_a_failure() {
        let bridge = BlockingBridge::new(1, None).unwrap();
        let result: Result<bool, BridgeError<String>> = bridge.run(async { Ok(false) });
        assert_eq!(result, Ok(false));
    }

    #[test]
    fn failure_is_carried_through() {
        let bridge = BlockingBridge::new(1, None).unwrap();
        let result: Result<bool, BridgeError<String>> =
            bridge.run(async { Err("rejected".to_string()) });
        assert_eq!(result, Err(BridgeError::Failed("rejected".to_string())));
    }

    #[test]
    fn waits_for_async_work() {
        let bridge = BlockingBridge::new(1, None).unwrap();
        let result: Result<u32, BridgeError<()>> = bridge.run(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(7)
        });
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn timeout_cancels_the_operation() {
        let bridge = BlockingBridge::new(1, Some(Duration::from_millis(20))).unwrap();
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(Arc::clone(&dropped));

        let result: Result<(), BridgeError<()>> = bridge.run(async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        assert_eq!(result, Err(BridgeError::Timeout));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_operation_is_aborted() {
        let bridge = BlockingBridge::new(1, None).unwrap();
        let result: Result<(), BridgeError<()>> = bridge.run(explode());
        assert_eq!(result, Err(BridgeError::Aborted));
    }

    #[test]
    fn many_callers_share_one_worker() {
        let bridge = Arc::new(BlockingBridge::new(1, None).unwrap());
        let completed = Arc::new(AtomicUsize::new(0));

        let callers: Vec<_> = (0..8)
            .map(|i| {
                let bridge = Arc::clone(&bridge);
                let completed = Arc::clone(&completed);
                thread::spawn(move || {
                    let result: Result<usize, BridgeError<()>> = bridge.run(async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(i)
                    });
                    assert_eq!(result, Ok(i));
                    completed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for caller in callers {
            caller.join().unwrap();
        }
        assert_eq!(completed.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn owned_runtime_can_be_dropped_inside_async_context() {
        let bridge = BlockingBridge::new(1, None).unwrap();
        drop(bridge);
    }

    #[test]
    fn shared_runtime_handle() {
        let runtime = Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap();
        let bridge = BlockingBridge::with_handle(runtime.handle().clone(), None);

        let result: Result<&str, BridgeError<()>> = bridge.run(async { Ok("done") });
        assert_eq!(result, Ok("done"));
    }
}
