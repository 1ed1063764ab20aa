/*!
 * Deferred Deletion
 * Background worker that runs final deletions off the releasing thread
 */

use crate::core::errors::{RuntimeError, RuntimeResult};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

pub(crate) type DeferredTask = Box<dyn FnOnce() + Send>;

/// Submission side, shared by every object type of a manager
#[derive(Clone)]
pub(crate) struct DeferredQueue {
    sender: Arc<RwLock<Option<flume::Sender<DeferredTask>>>>,
    pending: Arc<AtomicUsize>,
}

impl DeferredQueue {
    /// Queue a task; hands it back if the worker is gone
    pub fn submit(&self, task: DeferredTask) -> Result<(), DeferredTask> {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            return Err(task);
        };

        self.pending.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        sender
            .send(Box::new(move || {
                pending.fetch_sub(1, Ordering::Relaxed);
                task();
            }))
            .map_err(|err| {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                err.into_inner()
            })
    }

    /// Tasks queued but not yet started
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

/// Owns the worker thread
pub(crate) struct DeferredDeleter {
    queue: DeferredQueue,
    worker: Option<JoinHandle<()>>,
}

impl DeferredDeleter {
    pub fn spawn() -> RuntimeResult<Self> {
        let (sender, receiver) = flume::unbounded::<DeferredTask>();

        let worker = thread::Builder::new()
            .name("refcore-deferred-delete".into())
            .spawn(move || {
                for task in receiver.iter() {
                    // A failing delete procedure must not strand the tasks behind it
                    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        error!(panic = %panic_message(&*panic), "deferred delete panicked");
                    }
                }
                debug!("deferred delete worker exiting");
            })
            .map_err(|e| RuntimeError::WorkerUnavailable(e.to_string()))?;

        debug!("deferred delete worker started");

        Ok(Self {
            queue: DeferredQueue {
                sender: Arc::new(RwLock::new(Some(sender))),
                pending: Arc::new(AtomicUsize::new(0)),
            },
            worker: Some(worker),
        })
    }

    pub fn queue(&self) -> DeferredQueue {
        self.queue.clone()
    }

    /// Block until every task queued before this call has run
    pub fn flush(&self) -> RuntimeResult<()> {
        let (done_tx, done_rx) = flume::bounded::<()>(1);
        self.queue
            .submit(Box::new(move || {
                let _ = done_tx.send(());
            }))
            .map_err(|_| RuntimeError::WorkerUnavailable("worker has shut down".into()))?;

        done_rx
            .recv()
            .map_err(|_| RuntimeError::WorkerUnavailable("worker stopped while flushing".into()))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl Drop for DeferredDeleter {
    fn drop(&mut self) {
        // Closing the only sender lets the worker drain what is queued and exit
        drop(self.queue.sender.write().take());

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                warn!("deferred delete worker dropped its own manager, not joining");
                return;
            }
            if worker.join().is_err() {
                warn!("deferred delete worker panicked");
            }
        }
    }
}
