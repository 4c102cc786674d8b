use crate::config::MatchPolicy;
use crate::hierarchy::TypeHierarchy;
use crate::key::{Event, EventTypeKey};
use fxhash::FxHashSet;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type whose methods handle events.
///
/// `declare` lists the handlers once per type; [`EventBus::register`](crate::EventBus::register)
/// binds them to a shared owner instance.
///
/// # Examples
/// ```rust
/// use herald_event_bus::{Handlers, Subscribe};
///
/// struct UserCreated {
///     id: u64,
/// }
///
/// struct Mailer;
///
/// impl Mailer {
///     fn on_user_created(&self, event: &UserCreated) -> anyhow::Result<()> {
///         anyhow::ensure!(event.id > 0, "user id must be positive");
///         Ok(())
///     }
/// }
///
/// impl Subscribe for Mailer {
///     fn declare(handlers: &mut Handlers<Self>) {
///         handlers.on("on_user_created", Self::on_user_created);
///     }
/// }
/// ```
pub trait Subscribe: Send + Sync + Sized + 'static {
    fn declare(handlers: &mut Handlers<Self>);
}

/// A posted event on its way to a handler.
pub(crate) struct EventRef<'a> {
    key: EventTypeKey,
    value: &'a (dyn Any + Send + Sync),
    hierarchy: &'a TypeHierarchy,
}

impl<'a> EventRef<'a> {
    pub(crate) const fn new(
        key: EventTypeKey,
        value: &'a (dyn Any + Send + Sync),
        hierarchy: &'a TypeHierarchy,
    ) -> Self {
        Self { key, value, hierarchy }
    }

    pub(crate) const fn key(&self) -> EventTypeKey {
        self.key
    }

    pub(crate) const fn value(&self) -> &'a (dyn Any + Send + Sync) {
        self.value
    }

    fn concrete<E: Event>(&self) -> Option<&'a E> {
        self.value.downcast_ref::<E>()
    }

    fn upcast<S: ?Sized + 'static>(&self) -> Option<&'a S> {
        self.hierarchy.view::<S>(self.key.id(), self.value)
    }
}

type Invoke<O> = Arc<dyn Fn(&O, &EventRef<'_>) -> Option<anyhow::Result<()>> + Send + Sync>;
type Invoker = Arc<dyn Fn(&EventRef<'_>) -> Option<anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Concrete,
    Supertype,
}

struct Declared<O> {
    name: &'static str,
    event_type: EventTypeKey,
    target: Target,
    invoke: Invoke<O>,
}

/// Handler table of one [`Subscribe`] type.
pub struct Handlers<O> {
    declared: Vec<Declared<O>>,
}

impl<O: Subscribe> Handlers<O> {
    pub(crate) fn collect() -> Self {
        let mut handlers = Self { declared: Vec::new() };
        O::declare(&mut handlers);
        handlers
    }

    /// Declares `handler` for events of type `E`.
    ///
    /// Under [`MatchPolicy::Polymorphic`] the handler also receives events declared as
    /// subtypes of `E`, viewed as an `E`.
    pub fn on<E: Event>(
        &mut self,
        name: &'static str,
        handler: impl Fn(&O, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let invoke: Invoke<O> = Arc::new(move |owner: &O, event: &EventRef<'_>| {
            event.concrete::<E>().or_else(|| event.upcast::<E>()).map(|event| handler(owner, event))
        });
        self.push(name, EventTypeKey::of::<E>(), Target::Concrete, invoke)
    }

    /// Declares `handler` for a category `S` that is never posted directly, such as a trait
    /// object. Only events declared as subtypes of `S` reach it, so it requires
    /// [`MatchPolicy::Polymorphic`].
    pub fn on_supertype<S: ?Sized + 'static>(
        &mut self,
        name: &'static str,
        handler: impl Fn(&O, &S) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let invoke: Invoke<O> = Arc::new(move |owner: &O, event: &EventRef<'_>| {
            event.upcast::<S>().map(|event| handler(owner, event))
        });
        self.push(name, EventTypeKey::of::<S>(), Target::Supertype, invoke)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    fn push(
        &mut self,
        name: &'static str,
        event_type: EventTypeKey,
        target: Target,
        invoke: Invoke<O>,
    ) -> &mut Self {
        self.declared.push(Declared { name, event_type, target, invoke });
        self
    }

    /// Binds the table to `owner`. Returns the valid subscriptions and a description of
    /// every rejected handler.
    pub(crate) fn bind(self, owner: &Arc<O>, policy: MatchPolicy) -> (Vec<Subscription>, Vec<String>) {
        let identity = SubscriptionId::owner_identity(owner);
        let mut seen = FxHashSet::default();
        let mut subscriptions = Vec::with_capacity(self.declared.len());
        let mut rejected = Vec::new();

        for declared in self.declared {
            if declared.name.trim().is_empty() {
                rejected.push(format!("blank handler name for {}", declared.event_type));
                continue;
            }
            if !seen.insert(declared.name) {
                rejected.push(format!("'{}' is declared more than once", declared.name));
                continue;
            }
            if declared.target == Target::Supertype && policy == MatchPolicy::Exact {
                rejected.push(format!(
                    "'{}' handles the category {} which exact matching never delivers",
                    declared.name, declared.event_type
                ));
                continue;
            }

            let owner = Arc::clone(owner);
            let invoke = declared.invoke;
            subscriptions.push(Subscription {
                id: SubscriptionId {
                    owner: identity,
                    owner_type: std::any::type_name::<O>(),
                    handler: declared.name,
                },
                event_type: declared.event_type,
                invoker: Arc::new(move |event: &EventRef<'_>| invoke(&owner, event)),
            });
        }

        (subscriptions, rejected)
    }
}

impl<O> fmt::Debug for Handlers<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.declared.iter().map(|declared| (declared.name, declared.event_type)))
            .finish()
    }
}

/// Identity of a subscription: the owner instance plus the handler name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    owner: usize,
    owner_type: &'static str,
    handler: &'static str,
}

impl SubscriptionId {
    /// Address of the owner's shared allocation. Stable while any subscription keeps the
    /// owner alive.
    pub(crate) fn owner_identity<O>(owner: &Arc<O>) -> usize {
        Arc::as_ptr(owner).cast::<()>().addr()
    }

    pub(crate) const fn owner(&self) -> usize {
        self.owner
    }

    #[must_use]
    pub const fn owner_type(&self) -> &'static str {
        self.owner_type
    }

    #[must_use]
    pub const fn handler(&self) -> &'static str {
        self.handler
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:x}::{}", self.owner_type, self.owner, self.handler)
    }
}

/// One handler of one owner, bound to the event type it declared.
#[derive(Clone)]
pub(crate) struct Subscription {
    id: SubscriptionId,
    event_type: EventTypeKey,
    invoker: Invoker,
}

impl Subscription {
    pub(crate) const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The declared type; may be a supertype of the posted events it receives.
    pub(crate) const fn event_type(&self) -> EventTypeKey {
        self.event_type
    }

    /// Runs the handler. `None` when the event cannot be viewed as the declared type.
    pub(crate) fn invoke(&self, event: &EventRef<'_>) -> Option<anyhow::Result<()>> {
        (self.invoker)(event)
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}
