//! Fixed-size table of playback slots.
//!
//! The table has exactly `2 * radius + 1` cells and a position lives in cell
//! `position % capacity`. Because the mount window is contiguous and never
//! wider than the table, two mounted positions never share a cell; a cell
//! still holding a slot for a different position means that slot was not torn
//! down, and [`SlotTable::insert`] hands it back so the caller can.

use super::slot::PlaybackSlot;
use crate::feed::FeedPosition;
use crate::window::MountWindow;

/// Owner of every mounted slot.
#[derive(Debug)]
pub struct SlotTable {
    cells: Vec<Option<PlaybackSlot>>,
}

impl SlotTable {
    /// Table with room for a window of the given radius.
    pub fn for_radius(radius: usize) -> Self {
        Self::with_capacity(2 * radius + 1)
    }

    /// Table with an explicit number of cells (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cells: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Number of cells.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Whether no slot is mounted.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    fn cell(&self, position: FeedPosition) -> usize {
        position.index() % self.cells.len()
    }

    /// Slot mounted at `position`.
    pub fn get(&self, position: FeedPosition) -> Option<&PlaybackSlot> {
        self.cells[self.cell(position)]
            .as_ref()
            .filter(|slot| slot.position() == position)
    }

    /// Mutable slot mounted at `position`.
    pub fn get_mut(&mut self, position: FeedPosition) -> Option<&mut PlaybackSlot> {
        let cell = self.cell(position);
        self.cells[cell]
            .as_mut()
            .filter(|slot| slot.position() == position)
    }

    /// Whether a slot is mounted at `position`.
    pub fn contains(&self, position: FeedPosition) -> bool {
        self.get(position).is_some()
    }

    /// Mount a slot in its cell.
    ///
    /// # Returns
    ///
    /// The slot previously occupying the cell, if any.
    pub fn insert(&mut self, slot: PlaybackSlot) -> Option<PlaybackSlot> {
        let cell = self.cell(slot.position());
        self.cells[cell].replace(slot)
    }

    /// Unmount the slot at `position`.
    pub fn remove(&mut self, position: FeedPosition) -> Option<PlaybackSlot> {
        let cell = self.cell(position);
        match &self.cells[cell] {
            Some(slot) if slot.position() == position => self.cells[cell].take(),
            _ => None,
        }
    }

    /// Unmount every slot outside `window` (all of them if `None`).
    pub fn drain_outside(&mut self, window: Option<MountWindow>) -> Vec<PlaybackSlot> {
        let mut removed = Vec::new();
        for cell in &mut self.cells {
            let outside = cell
                .as_ref()
                .is_some_and(|slot| !window.is_some_and(|w| w.contains(slot.position())));
            if outside {
                if let Some(slot) = cell.take() {
                    removed.push(slot);
                }
            }
        }
        removed.sort_by_key(PlaybackSlot::position);
        removed
    }

    /// Mounted positions in ascending order.
    pub fn positions(&self) -> Vec<FeedPosition> {
        let mut positions: Vec<_> = self.iter().map(PlaybackSlot::position).collect();
        positions.sort();
        positions
    }

    /// Iterate mounted slots in cell order.
    pub fn iter(&self) -> impl Iterator<Item = &PlaybackSlot> {
        self.cells.iter().flatten()
    }

    /// Iterate mounted slots mutably in cell order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlaybackSlot> {
        self.cells.iter_mut().flatten()
    }

    /// Slots currently holding an engine handle.
    pub fn live_engine_count(&self) -> usize {
        self.iter().filter(|slot| slot.has_engine()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedItem;

    fn slot(pos: usize) -> PlaybackSlot {
        PlaybackSlot::new(FeedPosition(pos), FeedItem::new(format!("i{pos}"), "u"))
    }

    #[test]
    fn test_capacity_from_radius() {
        assert_eq!(SlotTable::for_radius(1).capacity(), 3);
        assert_eq!(SlotTable::for_radius(0).capacity(), 1);
        assert!(SlotTable::for_radius(2).is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = SlotTable::for_radius(1);
        assert!(table.insert(slot(4)).is_none());

        assert!(table.contains(FeedPosition(4)));
        // Same cell (4 % 3 == 1), different position
        assert!(table.get(FeedPosition(1)).is_none());
        assert!(table.get(FeedPosition(7)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_insert_returns_displaced_occupant() {
        let mut table = SlotTable::for_radius(1);
        table.insert(slot(1));
        let displaced = table.insert(slot(4)).unwrap();
        assert_eq!(displaced.position(), FeedPosition(1));
    }

    #[test]
    fn test_remove_checks_position() {
        let mut table = SlotTable::for_radius(1);
        table.insert(slot(2));
        assert!(table.remove(FeedPosition(5)).is_none());
        assert!(table.remove(FeedPosition(2)).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_drain_outside_window() {
        let mut table = SlotTable::for_radius(1);
        table.insert(slot(0));
        table.insert(slot(1));
        table.insert(slot(2));

        let window = MountWindow::new(FeedPosition(1), FeedPosition(3));
        let removed = table.drain_outside(Some(window));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].position(), FeedPosition(0));
        assert_eq!(table.positions(), vec![FeedPosition(1), FeedPosition(2)]);

        let removed = table.drain_outside(None);
        assert_eq!(removed.len(), 2);
        assert!(table.is_empty());
    }
}
