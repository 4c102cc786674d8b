//! # Runtime
//!
//! Tokio runtime profiles shared by the workspace.
//!
//! Every runtime is built explicitly from a [`RuntimeConfig`] and owned by whoever built it:
//! the shell's `main` (through [`main`]) or the event bus's asynchronous dispatcher (through
//! [`RuntimeConfig::dispatch`]).
//!
//! ## Profiles
//! * **Default**: worker threads detected from `TOKIO_WORKER_THREADS` or the hardware.
//! * **High Performance**: larger stacks and a longer keep-alive for busy processes.
//! * **Memory Efficient**: half the workers and smaller stacks.
//! * **Dispatch**: a fixed number of small worker threads running event handlers.
//!
//! ## Example
//!
//! ```rust,ignore
//! #[herald_runtime::main(memory_efficient)]
//! async fn main() -> anyhow::Result<()> {
//!     tracing::info!("Running on a memory-efficient runtime");
//!     Ok(())
//! }
//! ```

mod error;

pub use error::{RuntimeError, RuntimeErrorExt};
pub use herald_derive::main;

use std::{thread::available_parallelism, time::Duration};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// The default number of worker threads if detection fails.
const DEFAULT_WORKER_THREADS: usize = 4;
const MAX_WORKER_THREADS: usize = 1024;
/// The default stack size for threads (3 `MiB`).
const DEFAULT_STACK_SIZE: usize = 3 * 1024 * 1024;
/// Minimum allowed stack size (1 `MiB`).
const MIN_STACK_SIZE: usize = 1024 * 1024;
/// Maximum allowed stack size (16 `MiB`).
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
/// How long an idle thread stays alive.
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_THREAD_NAME: &str = "herald-worker";

/// Worker threads from `TOKIO_WORKER_THREADS`, falling back to the available parallelism.
fn detect_worker_threads() -> usize {
    std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0 && n <= MAX_WORKER_THREADS)
        .unwrap_or_else(|| {
            available_parallelism().map(std::num::NonZero::get).unwrap_or(DEFAULT_WORKER_THREADS)
        })
}

const fn clamp_worker_threads(threads: usize) -> usize {
    if threads == 0 {
        1
    } else if threads > MAX_WORKER_THREADS {
        MAX_WORKER_THREADS
    } else {
        threads
    }
}

fn validate_stack_size(stack_size: usize) -> usize {
    stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE)
}

fn thread_name_or_default(name: String) -> String {
    if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name }
}

fn normalize_config(config: &RuntimeConfig) -> RuntimeConfig {
    RuntimeConfig {
        worker_threads: clamp_worker_threads(config.worker_threads),
        stack_size: validate_stack_size(config.stack_size),
        thread_name: thread_name_or_default(config.thread_name.clone()),
        thread_keep_alive: config.thread_keep_alive,
    }
}

/// Configuration for a multi-thread Tokio runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detect_worker_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    /// Preset for long-running, busy processes.
    #[must_use = "Use this configuration for high-throughput processes"]
    pub fn high_performance() -> Self {
        Self {
            worker_threads: detect_worker_threads(),
            stack_size: 4 * 1024 * 1024,
            thread_name: "herald-hp".to_owned(),
            thread_keep_alive: Duration::from_secs(300),
        }
    }

    /// Preset for tools where memory footprint matters.
    #[must_use = "Use this configuration for low-footprint processes"]
    pub fn memory_efficient() -> Self {
        Self {
            worker_threads: (detect_worker_threads() / 2).max(1),
            stack_size: 2 * 1024 * 1024,
            thread_name: "herald-mem".to_owned(),
            thread_keep_alive: Duration::from_secs(30),
        }
    }

    /// Preset for the event dispatcher: exactly `workers` threads (at least one) with
    /// small stacks.
    #[must_use = "Use this configuration for an event dispatch pool"]
    pub fn dispatch(workers: usize) -> Self {
        Self {
            worker_threads: clamp_worker_threads(workers),
            stack_size: 2 * 1024 * 1024,
            thread_name: "herald-dispatch".to_owned(),
            thread_keep_alive: Duration::from_secs(10),
        }
    }

    #[must_use = "Customize the number of worker threads for the runtime"]
    pub const fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = clamp_worker_threads(threads);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = thread_name_or_default(name.into());
        self
    }
}

/// Creates a multi-thread runtime from `config`, with every Tokio driver enabled.
///
/// Out-of-range values are normalized first: worker threads to `[1, 1024]`, the stack size
/// to `[1 MiB, 16 MiB]`, and a blank thread name to the default.
///
/// # Errors
///
/// Returns [`RuntimeError::Io`] if the runtime cannot be created, typically because of
/// OS-level limits on thread creation.
///
/// # Examples
///
/// ```rust
/// use herald_runtime::{build_runtime_with_config, RuntimeConfig};
///
/// let config = RuntimeConfig::dispatch(2).with_thread_name("doc-dispatch");
/// let runtime = build_runtime_with_config(&config)?;
/// assert_eq!(runtime.block_on(async { 40 + 2 }), 42);
/// # Ok::<(), herald_runtime::RuntimeError>(())
/// ```
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime, RuntimeError> {
    let config = normalize_config(config);
    debug!(config = ?config, "Building tokio runtime");

    let mut builder = Builder::new_multi_thread();
    builder
        .worker_threads(config.worker_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive);

    builder.enable_all();

    builder.build().context("Failed to initialize runtime")
}
