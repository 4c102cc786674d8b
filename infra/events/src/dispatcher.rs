use crate::failure::{DispatchFailure, ErrorHandler, FailureKind, RejectReason, panic_message};
use crate::hierarchy::TypeHierarchy;
use crate::key::EventTypeKey;
use crate::pool::WorkerPool;
use crate::registry::Snapshot;
use crate::subscription::{EventRef, Subscription};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, trace, warn};

enum Executor {
    Inline,
    Pooled(WorkerPool),
}

/// Invokes the subscriptions of a snapshot, one isolated invocation each.
pub(crate) struct Dispatcher {
    executor: Executor,
    errors: Arc<dyn ErrorHandler>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub(crate) fn inline(errors: Arc<dyn ErrorHandler>) -> Self {
        Self { executor: Executor::Inline, errors, closed: AtomicBool::new(false) }
    }

    pub(crate) fn pooled(pool: WorkerPool, errors: Arc<dyn ErrorHandler>) -> Self {
        Self { executor: Executor::Pooled(pool), errors, closed: AtomicBool::new(false) }
    }

    /// Delivers `event` to every subscription in `snapshot`.
    ///
    /// Returns the number of invocations run (inline) or queued (pooled). Every failed or
    /// rejected invocation is reported to the error handler exactly once.
    pub(crate) fn dispatch(
        &self,
        key: EventTypeKey,
        event: &Arc<dyn Any + Send + Sync>,
        snapshot: &Snapshot,
        hierarchy: &Arc<TypeHierarchy>,
    ) -> usize {
        if snapshot.is_empty() {
            trace!(event = key.name(), "Event dropped: no matching subscriptions");
            return 0;
        }

        if self.closed.load(Ordering::Acquire) {
            for subscription in snapshot.iter() {
                self.reject(subscription, key, event, RejectReason::Closed);
            }
            return 0;
        }

        match &self.executor {
            Executor::Inline => {
                let event_ref = EventRef::new(key, &**event, hierarchy);
                for subscription in snapshot.iter() {
                    invoke_isolated(subscription, &event_ref, self.errors.as_ref());
                }
                trace!(event = key.name(), count = snapshot.len(), "Event dispatched");
                snapshot.len()
            },
            Executor::Pooled(pool) => {
                let mut submitted = 0;
                for subscription in snapshot.iter() {
                    let job = {
                        let subscription = subscription.clone();
                        let event = Arc::clone(event);
                        let hierarchy = Arc::clone(hierarchy);
                        let errors = Arc::clone(&self.errors);
                        Box::new(move || {
                            let event_ref = EventRef::new(key, &*event, &hierarchy);
                            invoke_isolated(&subscription, &event_ref, errors.as_ref());
                        })
                    };
                    match pool.submit(job) {
                        Ok(()) => submitted += 1,
                        Err(reason) => self.reject(subscription, key, event, reason),
                    }
                }
                trace!(event = key.name(), count = submitted, "Event queued");
                submitted
            },
        }
    }

    /// Rejects further dispatch and stops the worker pool, if any.
    /// Returns the number of queued invocations abandoned after `grace`.
    pub(crate) fn shutdown(&self, grace: Duration) -> usize {
        self.closed.store(true, Ordering::Release);
        match &self.executor {
            Executor::Inline => 0,
            Executor::Pooled(pool) => pool.shutdown(grace),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn pending(&self) -> usize {
        match &self.executor {
            Executor::Inline => 0,
            Executor::Pooled(pool) => pool.pending(),
        }
    }

    fn reject(
        &self,
        subscription: &Subscription,
        key: EventTypeKey,
        event: &Arc<dyn Any + Send + Sync>,
        reason: RejectReason,
    ) {
        warn!(
            event = key.name(),
            subscription = %subscription.id(),
            ?reason,
            "Event invocation rejected"
        );
        let failure =
            DispatchFailure::new(subscription.id(), key, &**event, FailureKind::Rejected(reason));
        report(self.errors.as_ref(), &failure);
    }
}

/// Runs one handler, turning an error, a panic, or a type mismatch into a reported failure.
fn invoke_isolated(subscription: &Subscription, event: &EventRef<'_>, errors: &dyn ErrorHandler) {
    let kind = match catch_unwind(AssertUnwindSafe(|| subscription.invoke(event))) {
        Ok(Some(Ok(()))) => return,
        Ok(Some(Err(err))) => FailureKind::Error(err),
        Ok(None) => FailureKind::TypeMismatch,
        Err(payload) => FailureKind::Panic(panic_message(payload.as_ref())),
    };
    let failure = DispatchFailure::new(subscription.id(), event.key(), event.value(), kind);
    report(errors, &failure);
}

fn report(errors: &dyn ErrorHandler, failure: &DispatchFailure<'_>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| errors.on_failure(failure))) {
        error!(
            subscription = %failure.subscription(),
            panic = %panic_message(payload.as_ref()),
            "Error handler panicked"
        );
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Dispatcher");
        match &self.executor {
            Executor::Inline => debug.field("executor", &"inline"),
            Executor::Pooled(pool) => debug.field("executor", pool),
        };
        debug.field("closed", &self.is_closed()).finish_non_exhaustive()
    }
}
