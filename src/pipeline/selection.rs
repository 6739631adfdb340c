//! Selection state: the ordered preview collection and its active pointer.
//!
//! The collection owns every [`PreviewItem`]. The active item is held by id
//! only, so removing an item can never leave a dangling reference: the
//! pointer is re-targeted in the same call.

use crate::model::{ImagePayload, PreviewId, PreviewItem};

/// Ordered, owned collection of preview items.
#[derive(Debug, Default)]
pub struct PreviewCollection {
    items: Vec<PreviewItem>,
    active: Option<PreviewId>,
    next_id: u64,
}

/// Fields of a preview item before an id is allocated.
#[derive(Debug, Clone)]
pub struct NewPreview {
    pub image: ImagePayload,
    pub filename: String,
    pub origin_page: Option<u32>,
    pub from_pdf: bool,
}

impl PreviewCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new items after the existing ones, in the given order.
    ///
    /// Every item starts unselected. If nothing is active yet and the merged
    /// collection is non-empty, its first item becomes active.
    pub fn append(&mut self, new_items: impl IntoIterator<Item = NewPreview>) -> Vec<PreviewId> {
        let mut ids = Vec::new();
        for np in new_items {
            self.next_id += 1;
            let id = PreviewId(self.next_id);
            self.items.push(PreviewItem {
                id,
                image: np.image,
                filename: np.filename,
                origin_page: np.origin_page,
                from_pdf: np.from_pdf,
                selected: false,
            });
            ids.push(id);
        }
        if self.active.is_none() {
            self.active = self.items.first().map(|p| p.id);
        }
        ids
    }

    /// Flip the `selected` flag of one item. Unknown ids are ignored.
    ///
    /// Returns the new flag value, or None for an unknown id.
    pub fn toggle(&mut self, id: PreviewId) -> Option<bool> {
        let item = self.items.iter_mut().find(|p| p.id == id)?;
        item.selected = !item.selected;
        Some(item.selected)
    }

    /// Make an item the displayed one. Unknown ids are ignored.
    pub fn set_active(&mut self, id: PreviewId) -> bool {
        if self.contains(id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// A thumbnail click: display the item and toggle its selection.
    ///
    /// Browsing and selecting are one gesture, so both happen together.
    pub fn click(&mut self, id: PreviewId) -> Option<bool> {
        if !self.set_active(id) {
            return None;
        }
        self.toggle(id)
    }

    /// Remove an item, moving the active pointer if it pointed at it.
    ///
    /// The pointer moves to the item that takes the removed one's position,
    /// else to the previous item, else to nothing.
    pub fn remove(&mut self, id: PreviewId) -> Option<PreviewItem> {
        let idx = self.items.iter().position(|p| p.id == id)?;
        let removed = self.items.remove(idx);
        if self.active == Some(id) {
            self.active = self
                .items
                .get(idx)
                .or_else(|| idx.checked_sub(1).and_then(|i| self.items.get(i)))
                .map(|p| p.id);
        }
        Some(removed)
    }

    /// Set every item's `selected` flag at once.
    pub fn select_all(&mut self, selected: bool) {
        for item in &mut self.items {
            item.selected = selected;
        }
    }

    pub fn get(&self, id: PreviewId) -> Option<&PreviewItem> {
        self.items.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PreviewId) -> bool {
        self.get(id).is_some()
    }

    pub fn active_id(&self) -> Option<PreviewId> {
        self.active
    }

    /// The displayed item, if any.
    pub fn active(&self) -> Option<&PreviewItem> {
        self.active.and_then(|id| self.get(id))
    }

    /// Selected items in collection order.
    pub fn selected(&self) -> Vec<&PreviewItem> {
        self.items.iter().filter(|p| p.selected).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreviewItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
