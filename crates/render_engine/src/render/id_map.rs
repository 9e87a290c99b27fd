//! Resource id map
//!
//! Translates opaque ids handed to game logic into the backend's native
//! handles. One map exists per resource class. Entries are inserted when a
//! generate command executes and removed when a retire command executes;
//! lookups during the remap phase never modify the map.

use std::collections::HashMap;

use crate::render::{RenderError, RenderResult, ResourceKind};

/// Sparse opaque-id → native-handle map for one resource class
#[derive(Debug, Clone)]
pub struct ResourceIdMap<H> {
    kind: ResourceKind,
    entries: HashMap<u32, H>,
}

impl<H: Copy> ResourceIdMap<H> {
    /// Create an empty map for `kind` resources
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Record the native handle of a freshly created resource
    ///
    /// # Errors
    /// [`RenderError::DuplicateResourceId`] if `id` is already mapped;
    /// regenerating an id without retiring it first is a usage error.
    pub fn push(&mut self, id: u32, handle: H) -> RenderResult<()> {
        if self.entries.contains_key(&id) {
            return Err(RenderError::DuplicateResourceId { kind: self.kind, id });
        }
        self.entries.insert(id, handle);
        Ok(())
    }

    /// Native handle of `id`, if mapped
    pub fn get(&self, id: u32) -> Option<H> {
        self.entries.get(&id).copied()
    }

    /// Whether `id` is mapped
    pub fn key_exists(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Forget `id`, returning its handle
    pub fn remove(&mut self, id: u32) -> Option<H> {
        self.entries.remove(&id)
    }

    /// Number of mapped ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resource class of this map
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Remove every entry, yielding the handles
    pub fn drain(&mut self) -> impl Iterator<Item = (u32, H)> + '_ {
        self.entries.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut map = ResourceIdMap::new(ResourceKind::Mesh);
        map.push(10, 3usize).unwrap();
        assert!(map.key_exists(10));
        assert_eq!(map.get(10), Some(3));
        assert_eq!(map.get(11), None);
        assert!(!map.key_exists(11));
    }

    #[test]
    fn test_duplicate_push_is_rejected() {
        let mut map = ResourceIdMap::new(ResourceKind::Texture);
        map.push(12, 1u32).unwrap();
        let err = map.push(12, 2u32).unwrap_err();
        assert!(matches!(
            err,
            RenderError::DuplicateResourceId { kind: ResourceKind::Texture, id: 12 }
        ));
        assert_eq!(map.get(12), Some(1));
    }

    #[test]
    fn test_remove_allows_reuse() {
        let mut map = ResourceIdMap::new(ResourceKind::Mesh);
        map.push(10, 'a').unwrap();
        assert_eq!(map.remove(10), Some('a'));
        assert!(map.is_empty());
        map.push(10, 'b').unwrap();
        assert_eq!(map.get(10), Some('b'));
    }
}
