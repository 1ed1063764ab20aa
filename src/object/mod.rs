/*!
 * Object Allocator
 *
 * Typed, reference-counted heap objects:
 * - ObjectManager: explicit type registry, owns the deferred-delete worker
 * - ObjectType: delete procedure, optional free list, counters
 * - Object: one holder of a reference
 */

mod deferred;
mod manager;
#[allow(clippy::module_inception)]
mod object;
mod object_type;
mod types;

pub use manager::{ObjectManager, ObjectTypeBuilder};
pub use object::Object;
pub use object_type::{DeleteProcedure, ObjectType, TypeDescriptor};
pub use types::{DeleteFlags, ObjectFlags, ObjectTypeInfo};
