#![allow(dead_code)]

use herald_event_bus::{
    DispatchFailure, ErrorHandler, FailureKind, Handlers, RejectReason, Subscribe, TypeHierarchy,
};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestEvent(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderCreated {
    pub order_id: u64,
    pub customer: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderShipped {
    pub order_id: u64,
    pub carrier: String,
}

/// Category shared by every order event.
pub trait OrderEvent: Send + Sync {
    fn order_id(&self) -> u64;
}

impl OrderEvent for OrderCreated {
    fn order_id(&self) -> u64 {
        self.order_id
    }
}

impl OrderEvent for OrderShipped {
    fn order_id(&self) -> u64 {
        self.order_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    pub actor: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentCaptured {
    pub audit: AuditRecord,
    pub amount: u64,
}

#[must_use]
pub fn order_hierarchy() -> TypeHierarchy {
    TypeHierarchy::new()
        .declare::<OrderCreated, dyn OrderEvent>(|event| event)
        .declare::<OrderShipped, dyn OrderEvent>(|event| event)
        .declare::<PaymentCaptured, AuditRecord>(|event| &event.audit)
}

/// Records every order event it sees, one line per handler call.
#[derive(Debug, Default)]
pub struct OrderLog {
    lines: Mutex<Vec<String>>,
}

impl OrderLog {
    fn on_created(&self, event: &OrderCreated) -> anyhow::Result<()> {
        self.lines.lock().push(format!("created:{}:{}", event.order_id, event.customer));
        Ok(())
    }

    fn on_shipped(&self, event: &OrderShipped) -> anyhow::Result<()> {
        self.lines.lock().push(format!("shipped:{}:{}", event.order_id, event.carrier));
        Ok(())
    }

    fn on_any_order(&self, event: &dyn OrderEvent) -> anyhow::Result<()> {
        self.lines.lock().push(format!("order:{}", event.order_id()));
        Ok(())
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    #[must_use]
    pub fn sorted_lines(&self) -> Vec<String> {
        let mut lines = self.lines();
        lines.sort();
        lines
    }
}

impl Subscribe for OrderLog {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers
            .on("on_created", Self::on_created)
            .on("on_shipped", Self::on_shipped)
            .on_supertype::<dyn OrderEvent>("on_any_order", |this, event| this.on_any_order(event));
    }
}

/// Collects audit actors, reached directly or through [`PaymentCaptured`].
#[derive(Debug, Default)]
pub struct Auditor {
    actors: Mutex<Vec<String>>,
}

impl Auditor {
    fn on_audit(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.actors.lock().push(record.actor.clone());
        Ok(())
    }

    #[must_use]
    pub fn actors(&self) -> Vec<String> {
        self.actors.lock().clone()
    }
}

impl Subscribe for Auditor {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on("on_audit", Self::on_audit);
    }
}

/// Counts [`TestEvent`] deliveries and sums their payloads.
#[derive(Debug, Default)]
pub struct Counter {
    calls: AtomicUsize,
    total: AtomicUsize,
}

impl Counter {
    fn on_test(&self, event: &TestEvent) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.total.fetch_add(usize::try_from(event.0)?, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl Subscribe for Counter {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on("on_test", Self::on_test);
    }
}

/// One failing, one panicking and one healthy handler for [`TestEvent`].
#[derive(Debug, Default)]
pub struct Faulty {
    healthy: AtomicUsize,
}

impl Faulty {
    fn fails(&self, event: &TestEvent) -> anyhow::Result<()> {
        anyhow::bail!("cannot handle {}", event.0)
    }

    fn panics(&self, event: &TestEvent) -> anyhow::Result<()> {
        panic!("handler exploded on {}", event.0)
    }

    fn healthy(&self, _: &TestEvent) -> anyhow::Result<()> {
        self.healthy.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn healthy_calls(&self) -> usize {
        self.healthy.load(Ordering::SeqCst)
    }
}

impl Subscribe for Faulty {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on("fails", Self::fails).on("panics", Self::panics).on("healthy", Self::healthy);
    }
}

/// Declares a blank and a duplicated handler name next to a valid one.
#[derive(Debug, Default)]
pub struct Misdeclared {
    calls: AtomicUsize,
}

impl Misdeclared {
    fn count(&self, _: &TestEvent) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Subscribe for Misdeclared {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers
            .on("count", Self::count)
            .on("count", Self::count)
            .on("", Self::count);
    }
}

/// Sleeps before recording a [`TestEvent`].
#[derive(Debug, Default)]
pub struct Sleeper {
    done: AtomicBool,
}

impl Sleeper {
    fn on_test(&self, event: &TestEvent) -> anyhow::Result<()> {
        std::thread::sleep(Duration::from_millis(event.0));
        self.done.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl Subscribe for Sleeper {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on("on_test", Self::on_test);
    }
}

/// Blocks every [`TestEvent`] handler call until opened.
#[derive(Debug, Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    entered: AtomicUsize,
    passed: AtomicUsize,
}

impl Gate {
    fn on_test(&self, _: &TestEvent) -> anyhow::Result<()> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock();
        while !*open {
            if self.opened.wait_for(&mut open, Duration::from_secs(10)).timed_out() {
                anyhow::bail!("gate was never opened");
            }
        }
        drop(open);
        self.passed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    #[must_use]
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::SeqCst)
    }
}

impl Subscribe for Gate {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on("on_test", Self::on_test);
    }
}

/// A reported failure, flattened for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub handler: &'static str,
    pub event_type: &'static str,
    pub kind: String,
    pub rejected: Option<RejectReason>,
    pub payload: Option<u64>,
}

/// Thread-safe store of reported failures.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Mutex<Vec<Recorded>>,
}

impl FailureLog {
    pub fn record(&self, failure: &DispatchFailure<'_>) {
        let rejected = match failure.kind() {
            FailureKind::Rejected(reason) => Some(*reason),
            _ => None,
        };
        self.entries.lock().push(Recorded {
            handler: failure.subscription().handler(),
            event_type: failure.event_type().name(),
            kind: failure.kind().to_string(),
            rejected,
            payload: failure.event::<TestEvent>().map(|event| event.0),
        });
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Recorded> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// An [`ErrorHandler`] writing into `log`.
#[must_use]
pub fn failure_sink(log: &Arc<FailureLog>) -> impl ErrorHandler {
    let log = Arc::clone(log);
    move |failure: &DispatchFailure<'_>| log.record(failure)
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
