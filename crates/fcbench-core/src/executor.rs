//! Fixed-size worker pool.
//!
//! `num_threads` named OS threads pull boxed jobs off one shared FIFO queue,
//! so jobs start in submission order. Each submission returns a
//! [`JobHandle`] that yields the job's value, or `WorkerPanicked` when the
//! job unwound. A panicking job never takes its thread down.

use crate::error::{BenchError, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(num_threads: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..num_threads.max(1))
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("fcbench-worker-{i}"))
                    .spawn(move || loop {
                        // The lock is released before the job runs.
                        let next = match receiver.lock() {
                            Ok(queue) => queue.recv(),
                            Err(_) => break,
                        };
                        match next {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        debug!("started worker pool with {} thread(s)", workers.len());
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Fails once the pool has been shut down.
    pub fn submit<T, F>(&self, job: F) -> Result<JobHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(BenchError::PoolShutDown)?;
        let (result_tx, result_rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // The handle may have been dropped; nobody wants the value then.
            let _ = result_tx.send(outcome);
        });
        sender.send(wrapped).map_err(|_| BenchError::PoolShutDown)?;
        Ok(JobHandle { receiver: result_rx })
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.is_none()
    }

    /// Stop accepting work, let queued jobs drain, and join every thread.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

pub struct JobHandle<T> {
    receiver: mpsc::Receiver<thread::Result<T>>,
}

impl<T> JobHandle<T> {
    /// Block until the job finishes.
    pub fn join(self) -> Result<T> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(BenchError::WorkerPanicked(panic_message(payload.as_ref()))),
            Err(_) => Err(BenchError::WorkerPanicked(
                "job was dropped before it ran".to_string(),
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
