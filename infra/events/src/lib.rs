//! # Event Bus
//!
//! An in-process publish/subscribe event bus with typed handler tables.
//!
//! ## Overview
//!
//! Subscribers implement [`Subscribe`] and list their handlers once; the [`EventBus`] binds
//! those handlers to a shared owner instance and delivers every posted event to each matching
//! handler, either on the posting thread or through a fixed pool of dispatch workers.
//!
//! ## Features
//!
//! * **Type-Safe**: Events are identified by their Rust type.
//! * **Polymorphic matching**: A handler for a category (a base struct or a `dyn Trait`)
//!   receives the event types declared as its subtypes in a [`TypeHierarchy`].
//! * **Isolated handlers**: An error or a panic in one handler never reaches the poster or
//!   the other handlers; it is reported once to the bus's [`ErrorHandler`].
//! * **Snapshot reads**: Copy-on-write subscription lists behind `parking_lot::RwLock`, so a
//!   post never observes a half-applied registration.
//! * **Bounded async delivery**: A dedicated `tokio` runtime drains a bounded queue; a full
//!   queue is reported, never silently dropped.
//!
//! # Example
//!
//! ```rust
//! use herald_event_bus::{EventBus, EventBusError, Handlers, Subscribe, TypeHierarchy};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! trait Notice: Send + Sync {
//!     fn text(&self) -> String;
//! }
//!
//! struct UserCreated {
//!     id: u64,
//! }
//!
//! impl Notice for UserCreated {
//!     fn text(&self) -> String {
//!         format!("user {} created", self.id)
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Audit {
//!     seen: AtomicUsize,
//! }
//!
//! impl Audit {
//!     fn on_notice(&self, notice: &dyn Notice) -> anyhow::Result<()> {
//!         assert!(!notice.text().is_empty());
//!         self.seen.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! impl Subscribe for Audit {
//!     fn declare(handlers: &mut Handlers<Self>) {
//!         handlers.on_supertype::<dyn Notice>("on_notice", |this, notice| this.on_notice(notice));
//!     }
//! }
//!
//! fn main() -> Result<(), EventBusError> {
//!     let hierarchy = TypeHierarchy::new().declare::<UserCreated, dyn Notice>(|event| event);
//!     let bus = EventBus::builder().hierarchy(hierarchy).build()?;
//!
//!     let audit = Arc::new(Audit::default());
//!     bus.register(&audit)?;
//!     bus.post(UserCreated { id: 42 });
//!
//!     assert_eq!(audit.seen.load(Ordering::SeqCst), 1);
//!     bus.shutdown()
//! }
//! ```

mod bus;
mod config;
mod dispatcher;
mod error;
mod failure;
mod hierarchy;
mod key;
mod pool;
mod registry;
mod subscription;

pub use bus::{EventBus, EventBusBuilder};
pub use config::{BusConfig, DeliveryMode, MatchPolicy};
pub use error::{EventBusError, EventBusErrorExt};
pub use failure::{DispatchFailure, ErrorHandler, FailureKind, LogErrorHandler, RejectReason};
pub use hierarchy::TypeHierarchy;
pub use key::{Event, EventTypeKey};
pub use subscription::{Handlers, Subscribe, SubscriptionId};
