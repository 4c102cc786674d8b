use crate::key::EventTypeKey;
use crate::subscription::SubscriptionId;
use std::any::Any;
use std::fmt;
use tracing::{error, warn};

/// Why an asynchronous invocation was not accepted by the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The bounded job queue had no free slot.
    QueueFull,
    /// The bus was shut down.
    Closed,
}

/// What went wrong with a single handler invocation.
#[derive(Debug)]
pub enum FailureKind {
    /// The handler returned an error.
    Error(anyhow::Error),
    /// The handler panicked; carries the panic message.
    Panic(String),
    /// The invocation never ran.
    Rejected(RejectReason),
    /// The event could not be presented as the handler's declared type.
    TypeMismatch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "handler failed: {err:#}"),
            Self::Panic(message) => write!(f, "handler panicked: {message}"),
            Self::Rejected(RejectReason::QueueFull) => f.write_str("rejected: queue full"),
            Self::Rejected(RejectReason::Closed) => f.write_str("rejected: bus closed"),
            Self::TypeMismatch => f.write_str("event does not match the declared handler type"),
        }
    }
}

/// A failed invocation of one subscription for one posted event.
#[derive(Debug)]
pub struct DispatchFailure<'a> {
    subscription: SubscriptionId,
    event_type: EventTypeKey,
    event: &'a (dyn Any + Send + Sync),
    kind: FailureKind,
}

impl<'a> DispatchFailure<'a> {
    pub(crate) const fn new(
        subscription: SubscriptionId,
        event_type: EventTypeKey,
        event: &'a (dyn Any + Send + Sync),
        kind: FailureKind,
    ) -> Self {
        Self { subscription, event_type, event, kind }
    }

    #[must_use]
    pub const fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Type of the posted event (not the handler's declared type).
    #[must_use]
    pub const fn event_type(&self) -> EventTypeKey {
        self.event_type
    }

    #[must_use]
    pub const fn kind(&self) -> &FailureKind {
        &self.kind
    }

    /// The posted event, if it is an `E`.
    #[must_use]
    pub fn event<E: Any>(&self) -> Option<&'a E> {
        self.event.downcast_ref::<E>()
    }
}

impl fmt::Display for DispatchFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.subscription, self.event_type, self.kind)
    }
}

/// Receives every handler failure of a bus.
///
/// Called exactly once per failed invocation, on the thread that ran (or tried to queue) it.
/// Implemented for closures taking `&DispatchFailure<'_>`.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_failure(&self, failure: &DispatchFailure<'_>);
}

impl<F> ErrorHandler for F
where
    F: Fn(&DispatchFailure<'_>) + Send + Sync + 'static,
{
    fn on_failure(&self, failure: &DispatchFailure<'_>) {
        self(failure);
    }
}

/// Default [`ErrorHandler`]: writes every failure to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn on_failure(&self, failure: &DispatchFailure<'_>) {
        let subscription = failure.subscription();
        match failure.kind() {
            FailureKind::Rejected(reason) => warn!(
                event = failure.event_type().name(),
                subscriber = subscription.owner_type(),
                handler = subscription.handler(),
                ?reason,
                "Event invocation rejected"
            ),
            kind => error!(
                event = failure.event_type().name(),
                subscriber = subscription.owner_type(),
                handler = subscription.handler(),
                "Event handler failed: {kind}"
            ),
        }
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
