use serde::Deserialize;
use std::time::Duration;

const DEFAULT_WORKERS: usize = 1;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;
const DEFAULT_THREAD_NAME: &str = "herald-dispatch";

/// Where handlers run relative to the caller of `post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Every handler runs on the posting thread before `post` returns.
    #[default]
    Sync,
    /// Each invocation is queued to the dispatcher's worker pool.
    Async,
}

/// How a posted event's type is matched against declared handler types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Only handlers declared for the event's own type.
    Exact,
    /// Handlers for the event's type and for every supertype declared in the
    /// [`TypeHierarchy`](crate::TypeHierarchy).
    #[default]
    Polymorphic,
}

/// Serializable bus settings, usually a `[bus]` table of the application config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub delivery: DeliveryMode,
    pub matching: MatchPolicy,
    /// Worker threads of the asynchronous pool.
    pub workers: usize,
    /// Bound of the asynchronous job queue.
    pub queue_capacity: usize,
    pub shutdown_grace_ms: u64,
    pub thread_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::default(),
            matching: MatchPolicy::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl BusConfig {
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
