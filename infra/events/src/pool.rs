use crate::error::{EventBusError, EventBusErrorExt};
use crate::failure::{RejectReason, panic_message};
use herald_runtime::RuntimeConfig;
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Counts submitted jobs that have not finished yet.
#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn complete(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }

    /// Blocks until no job is pending or `deadline` passes. Returns the jobs still pending.
    fn wait_drained(&self, deadline: Instant) -> usize {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.drained.wait_until(&mut count, deadline).timed_out() {
                break;
            }
        }
        *count
    }

    /// Forgets jobs that will never run.
    fn abandon(&self) {
        *self.count.lock() = 0;
        self.drained.notify_all();
    }
}

/// Fixed number of workers on a dedicated runtime, fed through a bounded queue.
pub(crate) struct WorkerPool {
    sender: RwLock<Option<mpsc::Sender<Job>>>,
    runtime: Mutex<Option<Runtime>>,
    pending: Arc<Pending>,
    workers: usize,
    capacity: usize,
}

impl WorkerPool {
    pub(crate) fn new(
        workers: usize,
        capacity: usize,
        thread_name: &str,
    ) -> Result<Self, EventBusError> {
        let config = RuntimeConfig::dispatch(workers).with_thread_name(thread_name);
        let runtime = herald_runtime::build_runtime_with_config(&config)
            .context("Building the dispatch worker pool")?;

        let (sender, receiver) = mpsc::channel::<Job>(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let pending = Arc::new(Pending::default());

        for worker in 0..config.worker_threads {
            let receiver = Arc::clone(&receiver);
            let pending = Arc::clone(&pending);
            runtime.spawn(async move {
                loop {
                    let job = receiver.lock().await.recv().await;
                    let Some(job) = job else { break };
                    // Handlers block; hand the worker core to another thread meanwhile.
                    let outcome = tokio::task::block_in_place(|| catch_unwind(AssertUnwindSafe(job)));
                    if let Err(payload) = outcome {
                        warn!(worker, panic = %panic_message(payload.as_ref()), "Dispatch job panicked");
                    }
                    pending.complete();
                }
                trace!(worker, "Dispatch worker stopped");
            });
        }

        debug!(workers = config.worker_threads, capacity, "Dispatch worker pool started");
        Ok(Self {
            sender: RwLock::new(Some(sender)),
            runtime: Mutex::new(Some(runtime)),
            pending,
            workers: config.worker_threads,
            capacity,
        })
    }

    /// Queues `job` without blocking.
    pub(crate) fn submit(&self, job: Job) -> Result<(), RejectReason> {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            return Err(RejectReason::Closed);
        };

        self.pending.begin();
        sender.try_send(job).map_err(|err| {
            self.pending.complete();
            match err {
                TrySendError::Full(_) => RejectReason::QueueFull,
                TrySendError::Closed(_) => RejectReason::Closed,
            }
        })
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Stops accepting jobs, lets the workers drain the queue for up to `grace`, then
    /// stops the runtime. Returns the number of jobs abandoned.
    pub(crate) fn shutdown(&self, grace: Duration) -> usize {
        let Some(sender) = self.sender.write().take() else {
            return 0;
        };
        drop(sender);

        let abandoned = self.pending.wait_drained(Instant::now() + grace);
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        self.pending.abandon();
        debug!(abandoned, "Dispatch worker pool stopped");
        abandoned
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.get_mut().take();
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("capacity", &self.capacity)
            .field("pending", &self.pending.get())
            .field("open", &self.sender.read().is_some())
            .finish()
    }
}
