/*!
 * Object Types
 * Header layout, flags and type information snapshots
 */

use crate::memory::FreeListStats;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicUsize;

/// Header flags, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectFlags(u8);

impl ObjectFlags {
    /// Memory came from the type's free list and returns there
    pub const FROM_POOL: Self = Self(0x1);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for ObjectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Context passed to a delete procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteFlags {
    /// Running on the deferred-delete worker rather than the releasing thread
    pub deferred: bool,
}

/// Common prefix of every object
#[repr(C)]
pub(crate) struct ObjectHeader {
    pub ref_count: AtomicUsize,
    pub flags: ObjectFlags,
}

/// Point-in-time view of an object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTypeInfo {
    pub name: String,
    pub live_objects: usize,
    pub total_created: u64,
    pub object_size: usize,
    pub pool: Option<FreeListStats>,
}
