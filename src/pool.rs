//! # Bounded Worker Pool
//!
//! Fan-out used by the schema and client stages. Tasks are pushed onto a
//! shared channel and drained by a fixed set of named worker threads; a
//! panicking task is isolated with `catch_unwind` so one bad zone never
//! takes down its siblings.
//!
//! Whether a stage runs parallel at all is decided up front by
//! [`use_parallel`], a pure function of the multithreading config and
//! the item count, so the sequential fallback is an explicit code path
//! that produces byte-identical outputs.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use tracing::{debug, error};

/// Decide whether a stage should fan out.
///
/// Parallelism kicks in only when it is enabled, there is more than one
/// item, and more than one worker is allowed. Everything else runs
/// sequentially on the calling thread.
pub fn use_parallel(enabled: bool, items: usize, max_workers: usize) -> bool {
    enabled && items > 1 && max_workers > 1
}

/// Number of workers for a parallel stage: never more threads than items.
pub fn worker_count(items: usize, max_workers: usize) -> usize {
    max_workers.min(items)
}

/// Outcome of one pool task, keyed by the task's label.
#[derive(Debug)]
pub enum StageTaskResult<R> {
    Completed(R),
    /// The task panicked; the payload is a best-effort panic message.
    Panicked(String),
}

impl<R> StageTaskResult<R> {
    pub fn completed(self) -> Option<R> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Panicked(_) => None,
        }
    }
}

type Task<R> = (String, Box<dyn FnOnce() -> R + Send>);

/// Fixed-size thread pool that runs a batch of labelled tasks to
/// completion and returns one result per label.
pub struct StagePool {
    workers: usize,
}

impl StagePool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Run every task and collect results by label.
    ///
    /// Labels must be unique within a batch. A label whose task panicked
    /// (or was lost to a poisoned channel) maps to
    /// [`StageTaskResult::Panicked`]; the map always contains every label
    /// that went in.
    pub fn run<R: Send + 'static>(&self, tasks: Vec<Task<R>>) -> BTreeMap<String, StageTaskResult<R>> {
        let labels: Vec<String> = tasks.iter().map(|(label, _)| label.clone()).collect();
        let mut results: BTreeMap<String, StageTaskResult<R>> = BTreeMap::new();
        if tasks.is_empty() {
            return results;
        }

        let workers = self.workers.min(tasks.len());
        debug!(workers, tasks = tasks.len(), "starting stage pool");

        let (task_tx, task_rx) = mpsc::channel::<Task<R>>();
        let (result_tx, result_rx) = mpsc::channel::<(String, StageTaskResult<R>)>();
        let task_rx = Arc::new(Mutex::new(task_rx));

        for (label, task) in tasks {
            // Send on a channel we still hold both ends of cannot fail.
            let _ = task_tx.send((label, task));
        }
        drop(task_tx);

        let mut handles = Vec::with_capacity(workers);
        for n in 0..workers {
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            let builder = std::thread::Builder::new().name(format!("zonegen-worker-{n}"));
            let spawned = builder.spawn(move || loop {
                let next = {
                    let Ok(guard) = task_rx.lock() else {
                        break;
                    };
                    guard.recv()
                };
                let Ok((label, task)) = next else {
                    break;
                };
                let outcome = match catch_unwind(AssertUnwindSafe(task)) {
                    Ok(value) => StageTaskResult::Completed(value),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(task = %label, panic = %message, "stage task panicked");
                        StageTaskResult::Panicked(message)
                    }
                };
                if result_tx.send((label, outcome)).is_err() {
                    break;
                }
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(worker = n, error = %e, "failed to spawn pool worker"),
            }
        }
        drop(result_tx);

        for (label, outcome) in result_rx {
            results.insert(label, outcome);
        }
        for handle in handles {
            let _ = handle.join();
        }

        // A task can vanish without a result if its worker died mid-send;
        // surface that as a panic rather than silently dropping the label.
        for label in labels {
            results
                .entry(label)
                .or_insert_with(|| StageTaskResult::Panicked("task was not executed".to_string()));
        }
        results
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
