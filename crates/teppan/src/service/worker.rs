//! Lifetime management for the background decoding task.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use tokio::{runtime::Handle, task::JoinHandle, sync::Notify};

/// Owns the spawned decoding task of a [`CompletionService`](super::CompletionService).
///
/// The task receives a shared `running` flag and a [`Notify`] at spawn time.
/// It is expected to loop while the flag is set and to park on the notifier
/// when it has nothing to do. Dropping the handle clears the flag and wakes
/// the task so it can exit after finishing whatever request it holds.
pub(crate) struct WorkerHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    notifier: Arc<Notify>,
}

impl WorkerHandle {
    pub(crate) fn spawn<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<()>,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Some(handle),
            notifier,
        }
    }

    /// Wake the task; new work has been queued.
    pub(crate) fn notify(&self) {
        self.notifier.notify_one();
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) &&
            self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task once its current request finishes. Safe to call more than once.
    ///
    /// Outside a runtime the task is detached instead of awaited; it still
    /// sees the cleared flag the next time its runtime polls it.
    pub(crate) fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();

        let Some(task) = self.handle.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let _ = task.await;
                });
            }
            Err(_) => drop(task),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
