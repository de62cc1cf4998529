//! Bounded worker pool
//!
//! Every submitted unit is spawned as its own tokio task and waits for one of
//! `workers` semaphore permits before it starts. [`WorkerPool::submit_all`]
//! is a barrier: it returns only when every unit of the batch has finished,
//! with results in submission order.
//!
//! Nothing is ever cancelled. [`WorkerPool::shutdown`] only stops the pool
//! from accepting further batches.

use crate::error::{PipelineError, Result};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

pub struct WorkerPool {
    workers: usize,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Create a pool running at most `workers` units at a time (minimum 1)
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            permits: Arc::new(Semaphore::new(workers)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run a batch of units and wait for all of them
    ///
    /// A unit that panics shows up as [`PipelineError::Worker`] in its slot;
    /// its siblings are unaffected.
    pub async fn submit_all<F, T>(&self, tasks: Vec<F>) -> Result<Vec<Result<T>>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(PipelineError::PoolClosed);
        }

        tracing::debug!(
            tasks = tasks.len(),
            workers = self.workers,
            "Submitting batch to worker pool"
        );

        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let permits = Arc::clone(&self.permits);
                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| PipelineError::PoolClosed)?;
                    task.await
                })
            })
            .collect();

        let results = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| Err(worker_error(e))))
            .collect();

        Ok(results)
    }

    /// Stop accepting new batches; running units are left alone
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(workers = self.workers, "Worker pool shut down");
        }
    }

    /// First unrecovered failure of a result batch, in submission order
    pub fn first_failure<T>(results: Vec<Result<T>>) -> Option<PipelineError> {
        results.into_iter().find_map(|r| r.err())
    }
}

fn worker_error(err: JoinError) -> PipelineError {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        PipelineError::Worker(format!("task panicked: {}", message))
    } else {
        PipelineError::Worker(err.to_string())
    }
}
