//! Order-flow scenario run by the `herald` binary.

use crate::settings::DemoSettings;
use herald_event_bus::{EventBus, Handlers, Subscribe, TypeHierarchy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub(crate) struct OrderPlaced {
    pub(crate) order_id: u64,
    pub(crate) amount: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct OrderShipped {
    pub(crate) order_id: u64,
    pub(crate) carrier: String,
}

/// Category covering every order event.
pub(crate) trait OrderEvent: Send + Sync {
    fn order_id(&self) -> u64;
}

impl OrderEvent for OrderPlaced {
    fn order_id(&self) -> u64 {
        self.order_id
    }
}

impl OrderEvent for OrderShipped {
    fn order_id(&self) -> u64 {
        self.order_id
    }
}

#[must_use]
pub(crate) fn hierarchy() -> TypeHierarchy {
    TypeHierarchy::new()
        .declare::<OrderPlaced, dyn OrderEvent>(|event| event)
        .declare::<OrderShipped, dyn OrderEvent>(|event| event)
}

/// Books revenue for placed orders and rejects every n-th shipment.
#[derive(Debug)]
struct Warehouse {
    reject_every: u64,
    revenue: AtomicU64,
    shipped: AtomicU64,
}

impl Warehouse {
    fn on_placed(&self, event: &OrderPlaced) -> anyhow::Result<()> {
        self.revenue.fetch_add(event.amount, Ordering::Relaxed);
        Ok(())
    }

    fn on_shipped(&self, event: &OrderShipped) -> anyhow::Result<()> {
        if self.reject_every > 0 && event.order_id % self.reject_every == 0 {
            anyhow::bail!("no stock left for order {} via {}", event.order_id, event.carrier);
        }
        self.shipped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Subscribe for Warehouse {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on("on_placed", Self::on_placed).on("on_shipped", Self::on_shipped);
    }
}

/// Keeps an audit trail of every order event through the category.
#[derive(Debug, Default)]
struct Journal {
    entries: Mutex<Vec<u64>>,
}

impl Journal {
    fn on_order(&self, event: &dyn OrderEvent) -> anyhow::Result<()> {
        self.entries.lock().push(event.order_id());
        Ok(())
    }
}

impl Subscribe for Journal {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on_supertype::<dyn OrderEvent>("on_order", |this, event| this.on_order(event));
    }
}

/// Outcome of one demo run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Report {
    pub(crate) invocations: usize,
    pub(crate) revenue: u64,
    pub(crate) shipped: u64,
    pub(crate) journaled: usize,
}

/// Registers the demo subscribers, posts the order flow, then drains the bus.
///
/// # Errors
/// Fails when a subscriber is rejected at registration, or when queued invocations outlive the
/// configured shutdown grace.
pub(crate) fn run(bus: &EventBus, settings: &DemoSettings) -> anyhow::Result<Report> {
    let warehouse = Arc::new(Warehouse {
        reject_every: settings.reject_every,
        revenue: AtomicU64::new(0),
        shipped: AtomicU64::new(0),
    });
    let journal = Arc::new(Journal::default());
    bus.register(&warehouse)?;
    bus.register(&journal)?;
    info!(subscriptions = bus.len(), delivery = ?bus.delivery(), "Subscribers registered");

    let mut invocations = 0;
    for order_id in 1..=settings.orders {
        invocations += bus.post(OrderPlaced { order_id, amount: order_id * 10 });
        if let Some(carrier) = carrier_for(&settings.carriers, order_id) {
            invocations += bus.post(OrderShipped { order_id, carrier: carrier.to_owned() });
        }
    }
    debug!(invocations, pending = bus.pending_jobs(), "Order flow posted");

    bus.shutdown()?;

    let report = Report {
        invocations,
        revenue: warehouse.revenue.load(Ordering::Relaxed),
        shipped: warehouse.shipped.load(Ordering::Relaxed),
        journaled: journal.entries.lock().len(),
    };
    info!(
        invocations = report.invocations,
        revenue = report.revenue,
        shipped = report.shipped,
        journaled = report.journaled,
        "Demo finished"
    );
    Ok(report)
}

fn carrier_for(carriers: &[String], order_id: u64) -> Option<&str> {
    let count = u64::try_from(carriers.len()).ok().filter(|count| *count > 0)?;
    let index = usize::try_from(order_id % count).ok()?;
    carriers.get(index).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_event_bus::{DeliveryMode, MatchPolicy};

    fn settings(orders: u64, reject_every: u64) -> DemoSettings {
        DemoSettings { orders, carriers: vec!["dhl".into()], reject_every }
    }

    #[test]
    fn test_sync_run_counts_every_handler() {
        let bus = EventBus::builder().hierarchy(hierarchy()).build().unwrap();
        let report = run(&bus, &settings(3, 0)).unwrap();

        // Each event reaches its concrete handler and the journal.
        assert_eq!(report.invocations, 12);
        assert_eq!(report.revenue, 60);
        assert_eq!(report.shipped, 3);
        assert_eq!(report.journaled, 6);
        assert!(bus.is_closed());
    }

    #[test]
    fn test_rejected_shipments_do_not_stop_the_flow() {
        let bus = EventBus::builder().hierarchy(hierarchy()).build().unwrap();
        let report = run(&bus, &settings(4, 2)).unwrap();
        assert_eq!(report.shipped, 2);
        assert_eq!(report.journaled, 8);
    }

    #[test]
    fn test_async_run_drains_before_reporting() {
        let bus = EventBus::builder()
            .hierarchy(hierarchy())
            .delivery(DeliveryMode::Async)
            .workers(2)
            .build()
            .unwrap();
        let report = run(&bus, &settings(5, 0)).unwrap();
        assert_eq!(report.invocations, 20);
        assert_eq!(report.journaled, 10);
        assert_eq!(report.revenue, 150);
    }

    #[test]
    fn test_exact_matching_is_rejected_for_category_handlers() {
        let bus = EventBus::builder()
            .hierarchy(hierarchy())
            .match_policy(MatchPolicy::Exact)
            .build()
            .unwrap();
        assert!(run(&bus, &settings(1, 0)).is_err());
    }

    #[test]
    fn test_carrier_rotation() {
        let carriers = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(carrier_for(&carriers, 1), Some("b"));
        assert_eq!(carrier_for(&carriers, 2), Some("a"));
        assert_eq!(carrier_for(&[], 2), None);
    }
}
