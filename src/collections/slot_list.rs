/*!
 * Slot List
 *
 * Dense array with O(1) add and remove through an in-place free chain.
 * Every slot is either occupied or holds the index of the next free slot,
 * so removal never shifts other elements and handles stay stable.
 */

use std::num::NonZeroU32;
use tracing::debug;

/// Stable handle to an element of a [`SlotList`]
///
/// Encoded as slot index + 1 so that 0 never names a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotHandle(NonZeroU32);

impl SlotHandle {
    #[inline]
    fn from_index(index: usize) -> Self {
        // index < u32::MAX is enforced by SlotList::add
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    #[inline]
    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// Raw handle value for passing across module boundaries
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0.get()
    }

    /// `None` for the reserved value 0
    #[inline]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied(T),
    Free(Option<u32>),
}

/// List with stable handles and slot recycling
///
/// Not internally synchronized.
#[derive(Debug, Clone)]
pub struct SlotList<T> {
    slots: Vec<Slot<T>>,
    allocated: usize,
    free_head: Option<u32>,
    count: usize,
}

impl<T> SlotList<T> {
    pub fn new(initial_capacity: usize) -> Self {
        // Initial capacity of 0 is not allowed
        let allocated = initial_capacity.max(1);
        Self {
            slots: Vec::with_capacity(allocated),
            allocated,
            free_head: None,
            count: 0,
        }
    }

    /// Store a value and return its handle
    ///
    /// Reuses the most recently freed slot if there is one; otherwise appends,
    /// doubling the storage when it is full.
    ///
    /// # Panics
    ///
    /// Panics if the list already holds `u32::MAX - 1` values, since handles
    /// are 32-bit indices.
    pub fn add(&mut self, value: T) -> SlotHandle {
        let index = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                match std::mem::replace(slot, Slot::Occupied(value)) {
                    Slot::Free(next) => self.free_head = next,
                    Slot::Occupied(_) => unreachable!("free chain points at an occupied slot"),
                }
                index as usize
            }
            None => {
                if self.slots.len() == self.allocated {
                    self.grow();
                }
                self.slots.push(Slot::Occupied(value));
                self.slots.len() - 1
            }
        };

        self.count += 1;
        SlotHandle::from_index(index)
    }

    fn grow(&mut self) {
        let new_allocated = self.allocated.saturating_mul(2).min(u32::MAX as usize - 1);
        assert!(
            new_allocated > self.slots.len(),
            "slot list cannot hold more than {} elements",
            u32::MAX - 1
        );

        debug!(
            old_capacity = self.allocated,
            new_capacity = new_allocated,
            "slot list grow"
        );

        self.slots.reserve_exact(new_allocated - self.slots.len());
        self.allocated = new_allocated;
    }

    /// Remove the value behind `handle`
    ///
    /// Returns `None` if the handle does not name an occupied slot; the free
    /// chain is left untouched in that case.
    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let index = handle.index();
        let slot = self.slots.get_mut(index)?;
        if !matches!(slot, Slot::Occupied(_)) {
            return None;
        }

        match std::mem::replace(slot, Slot::Free(self.free_head)) {
            Slot::Occupied(value) => {
                self.free_head = Some(index as u32);
                self.count -= 1;
                Some(value)
            }
            Slot::Free(_) => None,
        }
    }

    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        match self.slots.get(handle.index())? {
            Slot::Occupied(value) => Some(value),
            Slot::Free(_) => None,
        }
    }

    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        match self.slots.get_mut(handle.index())? {
            Slot::Occupied(value) => Some(value),
            Slot::Free(_) => None,
        }
    }

    /// Number of live values
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slots available before the next growth
    #[inline]
    pub fn capacity(&self) -> usize {
        self.allocated
    }

    /// Resumable enumeration of live values
    ///
    /// Start with `cursor = 0`. Do not mutate the list between calls.
    pub fn enumerate(&self, cursor: &mut usize) -> Option<(SlotHandle, &T)> {
        while *cursor < self.slots.len() {
            let index = *cursor;
            *cursor += 1;
            if let Slot::Occupied(value) = &self.slots[index] {
                return Some((SlotHandle::from_index(index), value));
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(value) => Some((SlotHandle::from_index(index), value)),
                Slot::Free(_) => None,
            })
    }
}

impl<T: PartialEq> SlotList<T> {
    /// Handle of the first live slot equal to `value`
    pub fn find(&self, value: &T) -> Option<SlotHandle> {
        self.slots.iter().position(|slot| matches!(slot, Slot::Occupied(v) if v == value))
            .map(SlotHandle::from_index)
    }
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self::new(1)
    }
}
