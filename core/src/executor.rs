//! Task-execution facilities for asynchronous invocations.
//!
//! # Design
//! A `ClientProxy` hands every invocation of an `Async`-shaped method to the
//! `Executor` in its resolved configuration. The executor owns its own
//! concurrency discipline; the proxy only submits boxed closures and reads
//! the result back through a `ResponseHandle`.
//!
//! `ThreadExecutor` is the platform default used when the builder never
//! received one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::ApiError;

/// A unit of work submitted to an `Executor`.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    /// Run `task` at some point, on any thread.
    fn execute(&self, task: Task) -> Result<(), ApiError>;

    /// Whether this executor has stopped accepting work.
    fn is_shutdown(&self) -> bool {
        false
    }
}

/// Runs every task on its own named OS thread.
#[derive(Debug, Default)]
pub struct ThreadExecutor {
    shutdown: AtomicBool,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting new tasks. Tasks already running are unaffected.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) -> Result<(), ApiError> {
        if self.is_shutdown() {
            return Err(ApiError::Rejected("executor is shut down".to_string()));
        }
        thread::Builder::new()
            .name("rest-client-async".to_string())
            .spawn(task)
            .map(|_| ())
            .map_err(|e| ApiError::Rejected(e.to_string()))
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Runs every task immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) -> Result<(), ApiError> {
        task();
        Ok(())
    }
}

/// Submits tasks to a tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running on.
    ///
    /// Panics outside a tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[cfg(feature = "tokio")]
impl Executor for TokioExecutor {
    fn execute(&self, task: Task) -> Result<(), ApiError> {
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn thread_executor_runs_off_the_caller_thread() {
        let executor = ThreadExecutor::new();
        let (tx, rx) = mpsc::channel();
        executor
            .execute(Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                tx.send(name).unwrap();
            }))
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("rest-client-async"));
    }

    #[test]
    fn shut_down_thread_executor_rejects_tasks() {
        let executor = ThreadExecutor::new();
        executor.shutdown();
        assert!(executor.is_shutdown());
        let err = executor.execute(Box::new(|| {})).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
    }

    #[test]
    fn inline_executor_runs_before_returning() {
        let (tx, rx) = mpsc::channel();
        InlineExecutor.execute(Box::new(move || tx.send(7).unwrap())).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 7);
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn tokio_executor_uses_blocking_pool() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let executor = TokioExecutor::new(runtime.handle().clone());
        let (tx, rx) = mpsc::channel();
        executor.execute(Box::new(move || tx.send(1).unwrap())).unwrap();
        assert_eq!(rx.recv().unwrap(), 1);
    }
}
