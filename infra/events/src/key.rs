use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker trait for values that can be posted to the [`EventBus`](crate::EventBus).
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: std::any::Any + Send + Sync + 'static {}
impl<T: std::any::Any + Send + Sync + 'static> Event for T {}

/// Routing identity of an event category.
///
/// Built from the Rust type of the event (or of a category such as `dyn Trait`).
/// Equality and hashing only look at the [`TypeId`]; the type name is carried for logs.
#[derive(Clone, Copy)]
pub struct EventTypeKey {
    id: TypeId,
    name: &'static str,
}

impl EventTypeKey {
    /// Key of the type `T`. Unsized categories (`dyn Trait`) are allowed.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, for diagnostics only.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventTypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventTypeKey {}

impl Hash for EventTypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventTypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for EventTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
