use crate::config::MatchPolicy;
use crate::hierarchy::TypeHierarchy;
use crate::key::EventTypeKey;
use crate::subscription::Subscription;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

/// Subscriptions indexed by their declared event type.
///
/// Each per-type slice is copy-on-write: writers build a new slice and swap it in under the
/// write lock, readers clone the `Arc`. A [`Snapshot`] is therefore never affected by later
/// mutation and no handler ever runs under the lock.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    entries: RwLock<FxHashMap<TypeId, Arc<[Subscription]>>>,
}

/// Point-in-time view of the subscriptions matching one event type.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    slices: Vec<Arc<[Subscription]>>,
}

impl Snapshot {
    /// Concrete-type subscriptions first, then each supertype in declaration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.slices.iter().flat_map(|slice| slice.iter())
    }

    pub(crate) fn len(&self) -> usize {
        self.slices.iter().map(|slice| slice.len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slices.iter().all(|slice| slice.is_empty())
    }
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriptions`, skipping ids already present under the same type.
    /// Returns how many were new.
    pub(crate) fn insert(&self, subscriptions: Vec<Subscription>) -> usize {
        let mut inserted = 0;
        let mut entries = self.entries.write();
        for subscription in subscriptions {
            let key = subscription.event_type();
            let current = entries.get(&key.id());
            if current.is_some_and(|slice| slice.iter().any(|s| s.id() == subscription.id())) {
                debug!(
                    event = key.name(),
                    subscription = %subscription.id(),
                    "Subscription already registered"
                );
                continue;
            }

            let mut next = current.map(|slice| slice.to_vec()).unwrap_or_default();
            debug!(event = key.name(), subscription = %subscription.id(), "Subscription added");
            next.push(subscription);
            entries.insert(key.id(), next.into());
            inserted += 1;
        }
        inserted
    }

    /// Removes every subscription bound to the owner `identity`. Empty types are dropped.
    pub(crate) fn remove_owner(&self, identity: usize) -> usize {
        let mut removed = 0;
        self.entries.write().retain(|_, slice| {
            if slice.iter().any(|s| s.id().owner() == identity) {
                let kept: Vec<Subscription> =
                    slice.iter().filter(|s| s.id().owner() != identity).cloned().collect();
                removed += slice.len() - kept.len();
                *slice = kept.into();
            }
            !slice.is_empty()
        });
        if removed > 0 {
            debug!(owner = identity, removed, "Subscriptions removed");
        }
        removed
    }

    pub(crate) fn contains_owner(&self, identity: usize) -> bool {
        self.entries.read().values().any(|slice| slice.iter().any(|s| s.id().owner() == identity))
    }

    /// Subscriptions that receive events of type `key` under `policy`.
    pub(crate) fn subscriptions_for(
        &self,
        key: EventTypeKey,
        hierarchy: &TypeHierarchy,
        policy: MatchPolicy,
    ) -> Snapshot {
        let entries = self.entries.read();
        let mut slices = Vec::new();
        if let Some(slice) = entries.get(&key.id()) {
            slices.push(Arc::clone(slice));
        }
        if policy == MatchPolicy::Polymorphic {
            slices.extend(
                hierarchy
                    .supertypes_of(key.id())
                    .filter_map(|supertype| entries.get(&supertype.id()).map(Arc::clone)),
            );
        }
        Snapshot { slices }
    }

    /// Number of subscriptions declared for exactly `key`.
    pub(crate) fn count(&self, key: EventTypeKey) -> usize {
        self.entries.read().get(&key.id()).map_or(0, |slice| slice.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().values().map(|slice| slice.len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every subscription. Returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.entries.write());
        drained.values().map(|slice| slice.len()).sum()
    }
}
