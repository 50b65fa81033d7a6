use crate::error::DispatchError;
use crate::tags::structures::{TagAddress, TagId, TagSnapshot, ValueRecord};
use dashmap::DashMap; // Using DashMap for concurrent R/W access
use std::sync::{Arc, Mutex, MutexGuard};

/// Per-tag guarded state. Classification and state transitions of one tag are
/// serialized on this lock; different tags never share it.
pub type TagCell = Mutex<TagSnapshot>;

/// Locks a tag cell, mapping a poisoned lock to a dispatch error.
pub fn lock_tag(id: TagId, cell: &TagCell) -> Result<MutexGuard<'_, TagSnapshot>, DispatchError> {
    cell.lock().map_err(|_| DispatchError::PoisonedTag(id))
}

/// Manages the state of all tags in the system.
/// The map only hands out cell handles; all per-tag work happens on the cell.
#[derive(Debug, Clone)] // Clone provides cheap Arc clones
pub struct TagEngine {
    tags: Arc<DashMap<TagId, Arc<TagCell>>>,
}

impl TagEngine {
    pub fn new() -> Self {
        TagEngine {
            tags: Arc::new(DashMap::new()),
        }
    }

    /// Add or replace a tag definition. Returns the replaced cell, if any.
    pub fn register_tag(&self, tag: TagSnapshot) -> Option<Arc<TagCell>> {
        self.tags.insert(tag.id, Arc::new(Mutex::new(tag)))
    }

    /// Unregisters a tag. Returns its cell so in-flight work can be awaited.
    pub fn remove_tag(&self, id: TagId) -> Option<Arc<TagCell>> {
        self.tags.remove(&id).map(|(_, cell)| cell)
    }

    /// True if `cell` is still the registered cell of `id`.
    pub fn is_registered(&self, id: TagId, cell: &Arc<TagCell>) -> bool {
        self.tags
            .get(&id)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), cell))
    }

    /// Handle to the guarded state of a tag. The shard lock is released on return.
    pub fn get_cell(&self, id: TagId) -> Option<Arc<TagCell>> {
        self.tags.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Get a copy of a tag's full state.
    pub fn snapshot(&self, id: TagId) -> Option<TagSnapshot> {
        let cell = self.get_cell(id)?;
        let tag = lock_tag(id, &cell).ok()?;
        Some(tag.clone())
    }

    /// Get the last accepted value of a tag.
    pub fn read_value(&self, id: TagId) -> Option<ValueRecord> {
        self.snapshot(id).and_then(|tag| tag.current_value)
    }

    /// Replace the filtering configuration of a tag, keeping its current value.
    /// Returns the previous address.
    pub fn update_address(&self, id: TagId, address: TagAddress) -> Option<TagAddress> {
        let cell = self.get_cell(id)?;
        let mut tag = lock_tag(id, &cell).ok()?;
        Some(std::mem::replace(&mut tag.address, address))
    }

    /// Get a list of all registered tag ids, sorted.
    pub fn tag_ids(&self) -> Vec<TagId> {
        let mut ids: Vec<TagId> = self.tags.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Copies of all tags, sorted by id.
    pub fn all_snapshots(&self) -> Vec<TagSnapshot> {
        self.tag_ids()
            .into_iter()
            .filter_map(|id| self.snapshot(id))
            .collect()
    }

    /// Find the tag an equipment driver address belongs to.
    pub fn find_by_address(&self, equipment_id: &str, address: &str) -> Option<TagId> {
        let cells: Vec<(TagId, Arc<TagCell>)> = self
            .tags
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        cells.into_iter().find_map(|(id, cell)| {
            let tag = lock_tag(id, &cell).ok()?;
            (tag.equipment_id == equipment_id && tag.driver_address == address).then_some(id)
        })
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for TagEngine {
    fn default() -> Self {
        Self::new()
    }
}
