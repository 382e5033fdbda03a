//! Foreground / background split.
//!
//! Storage work runs on tokio's blocking pool through
//! [`Dispatcher::background`]. Everything that touches the
//! [`UserRecordCache`] runs as a job on the single [`ForegroundLoop`], in the
//! order the jobs were submitted. The loop either owns a dedicated thread
//! ([`ForegroundLoop::spawn`]) or is pumped by its host
//! ([`ForegroundLoop::run_pending`]).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::cache::UserRecordCache;
use crate::error::{DataError, DataResult};

pub(crate) type ForegroundJob = Box<dyn FnOnce(&mut UserRecordCache) + Send + 'static>;

/// Cloneable handle for submitting work to either side.
#[derive(Clone)]
pub struct Dispatcher {
    runtime: Handle,
    foreground: mpsc::UnboundedSender<ForegroundJob>,
}

impl Dispatcher {
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Runs `task` on the blocking pool. Errors and panics come back as
    /// [`DataError::Storage`] tagged with `op`.
    pub async fn background<T, F>(&self, op: &'static str, task: F) -> DataResult<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.runtime.spawn_blocking(task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(DataError::storage(op, err)),
            Err(join) if join.is_panic() => Err(DataError::Storage {
                op,
                message: "background task panicked".into(),
            }),
            Err(_) => Err(DataError::Storage {
                op,
                message: "join error".into(),
            }),
        }
    }

    /// Queues `job` behind every job submitted before it.
    pub fn run_foreground<F>(&self, job: F) -> DataResult<()>
    where
        F: FnOnce(&mut UserRecordCache) + Send + 'static,
    {
        self.foreground
            .send(Box::new(job))
            .map_err(|_| DataError::ForegroundStopped)
    }

    /// Runs `f` on the foreground and waits for its value.
    pub async fn call_foreground<T, F>(&self, f: F) -> DataResult<T>
    where
        F: FnOnce(&mut UserRecordCache) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.run_foreground(move |cache| {
            let _ = tx.send(f(cache));
        })?;
        rx.await.map_err(|_| DataError::ForegroundStopped)
    }
}

/// The single foreground context and the cache it owns.
pub struct ForegroundLoop {
    cache: UserRecordCache,
    jobs: mpsc::UnboundedReceiver<ForegroundJob>,
}

impl ForegroundLoop {
    /// Creates the loop and the dispatcher feeding it. Background work goes
    /// to `runtime`.
    pub fn new(runtime: Handle) -> (Dispatcher, ForegroundLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            runtime,
            foreground: tx,
        };
        let foreground = ForegroundLoop {
            cache: UserRecordCache::default(),
            jobs: rx,
        };
        (dispatcher, foreground)
    }

    /// Moves the loop onto its own thread. The thread exits once every
    /// [`Dispatcher`] clone is dropped.
    pub fn spawn(self) -> std::io::Result<ForegroundHandle> {
        let thread = std::thread::Builder::new()
            .name("pps-foreground".into())
            .spawn(move || self.run())?;
        Ok(ForegroundHandle { thread })
    }

    /// Runs every job queued so far without blocking; returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            self.execute(job);
            ran += 1;
        }
        ran
    }

    pub fn cache(&self) -> &UserRecordCache {
        &self.cache
    }

    fn run(mut self) {
        debug!(target: "pps::dispatch", "foreground loop started");
        while let Some(job) = self.jobs.blocking_recv() {
            self.execute(job);
        }
        debug!(target: "pps::dispatch", "foreground loop stopped");
    }

    fn execute(&mut self, job: ForegroundJob) {
        let cache = &mut self.cache;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(move || job(cache))) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic".into());
            error!(target: "pps::dispatch", %message, "foreground job panicked");
        }
    }
}

pub struct ForegroundHandle {
    thread: JoinHandle<()>,
}

impl ForegroundHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the loop has drained and exited.
    pub fn join(self) {
        if self.thread.join().is_err() {
            error!(target: "pps::dispatch", "foreground thread panicked");
        }
    }
}
