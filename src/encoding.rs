//! Deferred bitmap encoding.
//!
//! The producer thread renders; the expensive part of emitting a cursor is
//! compressing and writing it.  Depending on [`AsyncMode`], encode jobs run
//! inline, on one worker per builder, or through a single shared worker.
//! Queues are bounded, so a fast producer blocks instead of ballooning
//! memory.  A failed job parks its error; the next submit re-raises it and
//! the worker discards whatever was still queued.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::Error;
use crate::settings::AsyncMode;

pub type EncodeJob = Box<dyn FnOnce() -> Result<(), Error> + Send + 'static>;

#[derive(Default)]
struct Shared {
    error: Mutex<Option<Error>>,
}

/// Submission endpoint for one builder's encode jobs.
///
/// In inline mode a lane simply runs the job; otherwise it feeds the
/// builder's (or the shared) worker queue in FIFO order.
#[derive(Clone)]
pub struct Lane {
    tx: Option<Sender<EncodeJob>>,
    shared: Arc<Shared>,
}

impl Lane {
    pub fn submit(&self, job: EncodeJob) -> Result<(), Error> {
        if let Some(error) = self.shared.error.lock().unwrap().take() {
            return Err(error);
        }

        match &self.tx {
            None => job(),
            Some(tx) => tx
                .send(job)
                .map_err(|_| Error::InvalidState("encode worker terminated")),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Owns the encode workers for one pipeline run.
pub struct Scheduler {
    mode: AsyncMode,
    capacity: usize,
    shared: Arc<Shared>,
    shared_lane: Option<Lane>,
    workers: Vec<Worker>,
}

impl Scheduler {
    pub fn new(mode: AsyncMode, capacity: usize) -> Scheduler {
        let mut scheduler = Scheduler {
            mode,
            capacity: capacity.max(1),
            shared: Arc::new(Shared::default()),
            shared_lane: None,
            workers: Vec::new(),
        };

        if mode == AsyncMode::SingleWorker {
            let lane = scheduler.spawn_worker();
            scheduler.shared_lane = Some(lane);
        }

        scheduler
    }

    /// A lane for a new builder.
    pub fn lane(&mut self) -> Lane {
        match self.mode {
            AsyncMode::Off => Lane {
                tx: None,
                shared: self.shared.clone(),
            },
            AsyncMode::SingleWorker => self.shared_lane.clone().expect("spawned in new()"),
            AsyncMode::PerBuilder => self.spawn_worker(),
        }
    }

    fn spawn_worker(&mut self) -> Lane {
        let (tx, rx) = bounded::<EncodeJob>(self.capacity);
        let (done_tx, done_rx) = bounded::<()>(1);
        let shared = self.shared.clone();

        let handle = thread::spawn(move || {
            worker_loop(rx, shared);
            let _ = done_tx.send(());
        });

        self.workers.push(Worker {
            handle,
            done: done_rx,
        });

        Lane {
            tx: Some(tx),
            shared: self.shared.clone(),
        }
    }

    /// Waits for all workers to drain, then surfaces any stored error.
    ///
    /// All lanes must be dropped before this is called, or the workers
    /// never see the end of their queues.
    pub fn finalize(mut self, timeout: Duration) -> Result<(), Error> {
        self.shared_lane = None;

        let deadline = Instant::now() + timeout;
        for worker in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if worker.done.recv_timeout(remaining).is_err() {
                return Err(Error::EncodeTimeout(timeout));
            }
            let _ = worker.handle.join();
        }

        if let Some(error) = self.shared.error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }
}

fn worker_loop(rx: Receiver<EncodeJob>, shared: Arc<Shared>) {
    let mut failed = false;

    for job in rx.iter() {
        // After a failure the queue is drained without running anything.
        if failed {
            continue;
        }

        if let Err(error) = job() {
            let mut slot = shared.error.lock().unwrap();
            if slot.is_none() {
                *slot = Some(error);
            }
            failed = true;
        }
    }
}
