//! Type-indexed scratch map shared by [`crate::Message`], and reused by the
//! `Handle` and `Future` layers for their own aux tables (spec §9: "the
//! rewrite becomes a type-indexed map when callers use it for a single
//! value type").

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A small `HashMap<TypeId, Box<dyn Any>>` wrapper. Not serialized, not part
/// of message equality, and dropped (not cloned) whenever its owner is
/// cloned for copy-on-write — aux data is per-holder scratch space, not
/// wire content.
#[derive(Default)]
pub struct AuxMap {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl AuxMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value for type `T`, dropping any previous value of the same
    /// type (matches spec §9: "duplicate keys overwrite and drop the
    /// previous value's destructor").
    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AuxMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuxMap")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_roundtrip() {
        let mut aux = AuxMap::new();
        aux.set(42u32);
        assert_eq!(aux.get::<u32>(), Some(&42));
        assert_eq!(aux.remove::<u32>(), Some(42));
        assert_eq!(aux.get::<u32>(), None);
    }

    #[test]
    fn distinct_types_do_not_collide() {
        let mut aux = AuxMap::new();
        aux.set(1u32);
        aux.set("hello".to_string());
        assert_eq!(aux.get::<u32>(), Some(&1));
        assert_eq!(aux.get::<String>(), Some(&"hello".to_string()));
    }

    #[test]
    fn overwrite_drops_previous_value() {
        let mut aux = AuxMap::new();
        aux.set(1u32);
        aux.set(2u32);
        assert_eq!(aux.get::<u32>(), Some(&2));
    }
}
