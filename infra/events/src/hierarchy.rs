use crate::key::{Event, EventTypeKey};
use fxhash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

/// Presents a type-erased event as the category `S`.
trait Upcast<S: ?Sized>: Send + Sync {
    fn view<'a>(&self, event: &'a (dyn Any + Send + Sync)) -> Option<&'a S>;
}

struct Projection<Sub, S: ?Sized, F> {
    project: F,
    _marker: PhantomData<fn(&Sub) -> &S>,
}

impl<Sub, S, F> Upcast<S> for Projection<Sub, S, F>
where
    Sub: Event,
    S: ?Sized + 'static,
    F: Fn(&Sub) -> &S + Send + Sync + 'static,
{
    fn view<'a>(&self, event: &'a (dyn Any + Send + Sync)) -> Option<&'a S> {
        event.downcast_ref::<Sub>().map(|event| (self.project)(event))
    }
}

struct Supertype {
    key: EventTypeKey,
    // Holds a `Box<dyn Upcast<S>>` for the category `S` named by `key`.
    view: Box<dyn Any + Send + Sync>,
}

/// Explicit subtype table used by [`MatchPolicy::Polymorphic`](crate::MatchPolicy).
///
/// Rust has no runtime subtyping, so every "`Sub` is a `Super`" relation is declared up
/// front together with the projection that presents a `Sub` as a `Super`: an unsizing
/// coercion to a trait object, or a borrow of an embedded base struct.
///
/// Relations are not transitive. Declare every ancestor directly.
///
/// # Examples
/// ```rust
/// use herald_event_bus::TypeHierarchy;
///
/// trait Audited: Send + Sync {
///     fn actor(&self) -> &str;
/// }
///
/// struct Login {
///     user: String,
/// }
///
/// impl Audited for Login {
///     fn actor(&self) -> &str {
///         &self.user
///     }
/// }
///
/// let hierarchy = TypeHierarchy::new().declare::<Login, dyn Audited>(|login| login);
/// assert!(hierarchy.is_subtype::<Login, dyn Audited>());
/// ```
#[derive(Default)]
pub struct TypeHierarchy {
    supertypes: FxHashMap<TypeId, (EventTypeKey, Vec<Supertype>)>,
}

impl TypeHierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `Sub` as a subtype of `Super`, viewed through `view`.
    ///
    /// Declaring the same pair again replaces the previous view. A type is never declared
    /// as its own supertype; such declarations are ignored.
    #[must_use = "the hierarchy is returned with the new relation"]
    pub fn declare<Sub, Super>(
        mut self,
        view: impl Fn(&Sub) -> &Super + Send + Sync + 'static,
    ) -> Self
    where
        Sub: Event,
        Super: ?Sized + 'static,
    {
        let sub = EventTypeKey::of::<Sub>();
        let key = EventTypeKey::of::<Super>();
        if sub == key {
            warn!(event = sub.name(), "Ignoring declaration of a type as its own supertype");
            return self;
        }

        let upcast: Box<dyn Upcast<Super>> =
            Box::new(Projection::<Sub, Super, _> { project: view, _marker: PhantomData });
        let supertype = Supertype { key, view: Box::new(upcast) };

        let (_, supertypes) =
            self.supertypes.entry(sub.id()).or_insert_with(|| (sub, Vec::new()));
        match supertypes.iter_mut().find(|existing| existing.key == key) {
            Some(existing) => *existing = supertype,
            None => supertypes.push(supertype),
        }
        self
    }

    /// Whether `Sub` was declared as a direct subtype of `Super`.
    #[must_use]
    pub fn is_subtype<Sub: Event, Super: ?Sized + 'static>(&self) -> bool {
        let key = EventTypeKey::of::<Super>();
        self.supertypes_of(TypeId::of::<Sub>()).any(|supertype| supertype == key)
    }

    /// Number of event types that have at least one declared supertype.
    #[must_use]
    pub fn len(&self) -> usize {
        self.supertypes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }

    /// Supertypes of the concrete type `id`, in declaration order.
    pub(crate) fn supertypes_of(&self, id: TypeId) -> impl Iterator<Item = EventTypeKey> + '_ {
        self.supertypes
            .get(&id)
            .into_iter()
            .flat_map(|(_, supertypes)| supertypes.iter().map(|supertype| supertype.key))
    }

    /// Views `event`, whose concrete type is `concrete`, as the category `S`.
    pub(crate) fn view<'a, S: ?Sized + 'static>(
        &self,
        concrete: TypeId,
        event: &'a (dyn Any + Send + Sync),
    ) -> Option<&'a S> {
        let key = EventTypeKey::of::<S>();
        let (_, supertypes) = self.supertypes.get(&concrete)?;
        let supertype = supertypes.iter().find(|supertype| supertype.key == key)?;
        let upcast = supertype.view.downcast_ref::<Box<dyn Upcast<S>>>()?;
        upcast.view(event)
    }
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (sub, supertypes) in self.supertypes.values() {
            let names: Vec<&str> = supertypes.iter().map(|supertype| supertype.key.name()).collect();
            map.entry(&sub.name(), &names);
        }
        map.finish()
    }
}
