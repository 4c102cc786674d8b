use crate::config::{BusConfig, DeliveryMode, MatchPolicy};
use crate::dispatcher::Dispatcher;
use crate::error::EventBusError;
use crate::failure::{ErrorHandler, LogErrorHandler};
use crate::hierarchy::TypeHierarchy;
use crate::key::{Event, EventTypeKey};
use crate::pool::WorkerPool;
use crate::registry::SubscriptionRegistry;
use crate::subscription::{Handlers, Subscribe, SubscriptionId};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MIN_CAPACITY: usize = 1;

#[derive(Debug)]
struct Inner {
    registry: SubscriptionRegistry,
    dispatcher: Dispatcher,
    hierarchy: Arc<TypeHierarchy>,
    delivery: DeliveryMode,
    policy: MatchPolicy,
    grace: Duration,
}

/// In-process publish/subscribe bus.
///
/// Owns one subscription registry and one dispatcher. Clones share both.
///
/// # Examples
/// ```rust
/// use herald_event_bus::{EventBus, Handlers, Subscribe};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// struct Deposited(u64);
///
/// #[derive(Default)]
/// struct Ledger {
///     balance: AtomicU64,
/// }
///
/// impl Ledger {
///     fn on_deposit(&self, event: &Deposited) -> anyhow::Result<()> {
///         self.balance.fetch_add(event.0, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// impl Subscribe for Ledger {
///     fn declare(handlers: &mut Handlers<Self>) {
///         handlers.on("on_deposit", Self::on_deposit);
///     }
/// }
///
/// # fn main() -> Result<(), herald_event_bus::EventBusError> {
/// let bus = EventBus::new();
/// let ledger = Arc::new(Ledger::default());
/// bus.register(&ledger)?;
///
/// assert_eq!(bus.post(Deposited(40)), 1);
/// assert_eq!(bus.post(Deposited(2)), 1);
/// assert_eq!(ledger.balance.load(Ordering::SeqCst), 42);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a synchronous bus with polymorphic matching, an empty hierarchy and the
    /// [`LogErrorHandler`].
    #[must_use]
    pub fn new() -> Self {
        let config = BusConfig::default();
        Self::from_parts(
            Dispatcher::inline(Arc::new(LogErrorHandler)),
            TypeHierarchy::new(),
            DeliveryMode::Sync,
            config.matching,
            config.shutdown_grace(),
        )
    }

    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Builds a bus from configuration, logging failures with the [`LogErrorHandler`].
    ///
    /// # Errors
    /// See [`EventBusBuilder::build`].
    pub fn from_config(config: &BusConfig, hierarchy: TypeHierarchy) -> Result<Self, EventBusError> {
        Self::builder().config(config).hierarchy(hierarchy).build()
    }

    fn from_parts(
        dispatcher: Dispatcher,
        hierarchy: TypeHierarchy,
        delivery: DeliveryMode,
        policy: MatchPolicy,
        grace: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: SubscriptionRegistry::new(),
                dispatcher,
                hierarchy: Arc::new(hierarchy),
                delivery,
                policy,
                grace,
            }),
        }
    }

    /// Registers every handler `O` declares, bound to `owner`.
    ///
    /// Registering the same owner again is a no-op for handlers already present. The bus keeps
    /// `owner` alive until it is unregistered or the bus is dropped.
    ///
    /// Returns the number of newly added subscriptions.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidHandler`] naming every rejected handler: a blank name,
    /// a name declared twice, or a supertype handler on a bus using [`MatchPolicy::Exact`].
    /// The valid handlers of `owner` are registered regardless.
    pub fn register<O: Subscribe>(&self, owner: &Arc<O>) -> Result<usize, EventBusError> {
        let (subscriptions, rejected) = Handlers::<O>::collect().bind(owner, self.inner.policy);
        let inserted = self.inner.registry.insert(subscriptions);
        debug!(subscriber = std::any::type_name::<O>(), inserted, "Subscriber registered");

        if rejected.is_empty() {
            return Ok(inserted);
        }
        warn!(
            subscriber = std::any::type_name::<O>(),
            rejected = rejected.len(),
            "Subscriber declares invalid handlers"
        );
        Err(EventBusError::InvalidHandler {
            message: rejected.join("; ").into(),
            context: Some(std::any::type_name::<O>().into()),
        })
    }

    /// Removes every subscription bound to `owner`. Returns how many were removed; `0` when
    /// `owner` was never registered.
    pub fn unregister<O: Subscribe>(&self, owner: &Arc<O>) -> usize {
        let removed = self.inner.registry.remove_owner(SubscriptionId::owner_identity(owner));
        debug!(subscriber = std::any::type_name::<O>(), removed, "Subscriber unregistered");
        removed
    }

    /// Whether any handler of `owner` is registered.
    #[must_use]
    pub fn is_registered<O: Subscribe>(&self, owner: &Arc<O>) -> bool {
        self.inner.registry.contains_owner(SubscriptionId::owner_identity(owner))
    }

    /// Delivers `event` to every matching subscription.
    ///
    /// Returns the number of invocations run ([`DeliveryMode::Sync`]) or queued
    /// ([`DeliveryMode::Async`]). Handler failures and rejected submissions go to the bus's
    /// [`ErrorHandler`], never to the caller.
    pub fn post<E: Event>(&self, event: E) -> usize {
        self.post_arc(Arc::new(event))
    }

    /// Delivers a shared event without re-wrapping it.
    pub fn post_arc<E: Event>(&self, event: Arc<E>) -> usize {
        let key = EventTypeKey::of::<E>();
        let snapshot =
            self.inner.registry.subscriptions_for(key, &self.inner.hierarchy, self.inner.policy);
        let event: Arc<dyn Any + Send + Sync> = event;
        self.inner.dispatcher.dispatch(key, &event, &snapshot, &self.inner.hierarchy)
    }

    /// Subscriptions a post of `E` would reach right now, in delivery order.
    #[must_use]
    pub fn subscriptions_for<E: Event>(&self) -> Vec<SubscriptionId> {
        self.inner
            .registry
            .subscriptions_for(EventTypeKey::of::<E>(), &self.inner.hierarchy, self.inner.policy)
            .iter()
            .map(|subscription| subscription.id())
            .collect()
    }

    /// Number of subscriptions declared for exactly `E`.
    #[must_use]
    pub fn subscriber_count<E: ?Sized + 'static>(&self) -> usize {
        self.inner.registry.count(EventTypeKey::of::<E>())
    }

    /// Total number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    /// Removes every subscription. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.inner.registry.clear();
        debug!(removed, "Event bus cleared");
        removed
    }

    /// Shuts down with the configured grace period.
    ///
    /// # Errors
    /// See [`EventBus::shutdown_timeout`].
    pub fn shutdown(&self) -> Result<(), EventBusError> {
        self.shutdown_timeout(self.inner.grace)
    }

    /// Stops accepting posts, then waits up to `grace` for queued invocations to finish.
    ///
    /// Later posts are rejected and reported to the error handler. Calling this again is a
    /// no-op.
    ///
    /// # Errors
    /// Returns [`EventBusError::GraceExceeded`] when queued invocations were abandoned.
    pub fn shutdown_timeout(&self, grace: Duration) -> Result<(), EventBusError> {
        let abandoned = self.inner.dispatcher.shutdown(grace);
        if abandoned == 0 {
            info!("Event bus shut down");
            return Ok(());
        }
        warn!(abandoned, ?grace, "Event bus shut down with pending invocations");
        Err(EventBusError::GraceExceeded {
            message: format!("{abandoned} queued invocations abandoned").into(),
            context: Some(format!("after {grace:?}").into()),
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.dispatcher.is_closed()
    }

    /// Queued or running asynchronous invocations. Always `0` for a synchronous bus.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.inner.dispatcher.pending()
    }

    #[must_use]
    pub fn delivery(&self) -> DeliveryMode {
        self.inner.delivery
    }

    #[must_use]
    pub fn match_policy(&self) -> MatchPolicy {
        self.inner.policy
    }

    #[must_use]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.inner.hierarchy
    }
}

/// Configures an [`EventBus`].
pub struct EventBusBuilder {
    delivery: DeliveryMode,
    policy: MatchPolicy,
    hierarchy: TypeHierarchy,
    errors: Arc<dyn ErrorHandler>,
    workers: usize,
    queue_capacity: usize,
    thread_name: String,
    grace: Duration,
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        let config = BusConfig::default();
        Self {
            delivery: config.delivery,
            policy: config.matching,
            hierarchy: TypeHierarchy::new(),
            errors: Arc::new(LogErrorHandler),
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            grace: config.shutdown_grace(),
            thread_name: config.thread_name,
        }
    }
}

impl EventBusBuilder {
    /// Copies every setting of `config`.
    #[must_use = "the builder is returned with the new settings"]
    pub fn config(mut self, config: &BusConfig) -> Self {
        self.delivery = config.delivery;
        self.policy = config.matching;
        self.workers = config.workers;
        self.queue_capacity = config.queue_capacity;
        self.thread_name.clone_from(&config.thread_name);
        self.grace = config.shutdown_grace();
        self
    }

    #[must_use = "the builder is returned with the new setting"]
    pub const fn delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    #[must_use = "the builder is returned with the new setting"]
    pub const fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use = "the builder is returned with the new setting"]
    pub fn hierarchy(mut self, hierarchy: TypeHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Replaces the default [`LogErrorHandler`].
    #[must_use = "the builder is returned with the new setting"]
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.errors = Arc::new(handler);
        self
    }

    /// Worker threads of the asynchronous pool.
    #[must_use = "the builder is returned with the new setting"]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bound of the asynchronous job queue.
    #[must_use = "the builder is returned with the new setting"]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use = "the builder is returned with the new setting"]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use = "the builder is returned with the new setting"]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Builds the bus. An asynchronous bus starts its worker pool here.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidCapacity`] if the worker count or queue capacity is
    /// zero, or [`EventBusError::Runtime`] if the worker runtime cannot be started.
    pub fn build(self) -> Result<EventBus, EventBusError> {
        let workers = validate_capacity("workers", self.workers)?;
        let queue_capacity = validate_capacity("queue_capacity", self.queue_capacity)?;

        let dispatcher = match self.delivery {
            DeliveryMode::Sync => Dispatcher::inline(self.errors),
            DeliveryMode::Async => {
                let pool = WorkerPool::new(workers, queue_capacity, &self.thread_name)?;
                Dispatcher::pooled(pool, self.errors)
            },
        };
        debug!(delivery = ?self.delivery, policy = ?self.policy, "Event bus built");

        Ok(EventBus::from_parts(dispatcher, self.hierarchy, self.delivery, self.policy, self.grace))
    }
}

impl fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("delivery", &self.delivery)
            .field("policy", &self.policy)
            .field("hierarchy", &self.hierarchy)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("thread_name", &self.thread_name)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

fn validate_capacity(name: &'static str, capacity: usize) -> Result<usize, EventBusError> {
    if capacity < MIN_CAPACITY {
        return Err(EventBusError::InvalidCapacity {
            message: format!("{name} must be >= {MIN_CAPACITY}").into(),
            context: None,
        });
    }
    Ok(capacity)
}
