/*!
 * refcore
 *
 * Runtime substrate for provider/presentation systems:
 * - Free-list pools for fixed-size blocks
 * - Typed, reference-counted objects with an explicit type registry
 * - Slot lists and hashtables
 * - A callback bus whose unregistration drains in-flight calls
 */

pub mod callback;
pub mod collections;
pub mod core;
pub mod memory;
pub mod monitoring;
pub mod object;

// Re-exports
pub use callback::{Callback, CallbackRegistration, CallbackStats, RegistrationGuard};
pub use collections::{Hashtable, SimpleHashtable, SlotHandle, SlotList};
pub use crate::core::{PoolParameters, RuntimeConfig, RuntimeError, RuntimeResult};
pub use memory::{Block, FreeList, FreeListStats};
pub use monitoring::init_tracing;
pub use object::{DeleteFlags, Object, ObjectManager, ObjectType, ObjectTypeInfo};
