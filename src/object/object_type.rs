/*!
 * Object Types
 *
 * An object type owns everything needed to build and destroy its objects:
 * the delete procedure, the optional free list sized for header + payload,
 * and the live/created counters reported through `ObjectTypeInfo`.
 */

use super::deferred::DeferredQueue;
use super::object::{Object, ObjectInner};
use super::types::{DeleteFlags, ObjectFlags, ObjectHeader, ObjectTypeInfo};
use crate::core::config::PoolParameters;
use crate::core::errors::RuntimeResult;
use crate::memory::{Block, FreeList};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Runs once per object, before its payload is dropped
pub type DeleteProcedure<T> = Box<dyn Fn(&mut T, DeleteFlags) + Send + Sync>;

/// Registry record for one kind of object
///
/// Obtained from [`ObjectManager`](super::ObjectManager); every object holds
/// an `Arc` to its type, so a type always outlives its objects.
pub struct ObjectType<T> {
    name: String,
    delete_procedure: Option<DeleteProcedure<T>>,
    pool: Option<FreeList>,
    deferred: Option<DeferredQueue>,
    live_objects: AtomicUsize,
    total_created: AtomicU64,
}

impl<T: Send + Sync + 'static> ObjectType<T> {
    pub(crate) fn new(
        name: String,
        delete_procedure: Option<DeleteProcedure<T>>,
        pool: Option<PoolParameters>,
        deferred: Option<DeferredQueue>,
    ) -> RuntimeResult<Self> {
        let pool = pool
            .map(|params| FreeList::with_layout(Self::layout(), params.max_count))
            .transpose()?;

        Ok(Self {
            name,
            delete_procedure,
            pool,
            deferred,
            live_objects: AtomicUsize::new(0),
            total_created: AtomicU64::new(0),
        })
    }

    #[inline]
    pub(crate) fn layout() -> Layout {
        Layout::new::<ObjectInner<T>>()
    }

    /// Create an object with a reference count of 1, aborting on exhaustion
    pub fn create_object(self: &Arc<Self>, body: T) -> Object<T> {
        let (block, flags) = match &self.pool {
            Some(pool) => (pool.allocate(), ObjectFlags::FROM_POOL),
            None => (Block::allocate(Self::layout()), ObjectFlags::empty()),
        };
        self.emplace(block, flags, body)
    }

    /// Create an object, returning `None` if memory is exhausted
    pub fn try_create_object(self: &Arc<Self>, body: T) -> Option<Object<T>> {
        let (block, flags) = match &self.pool {
            Some(pool) => (pool.try_allocate()?, ObjectFlags::FROM_POOL),
            None => (Block::try_allocate(Self::layout())?, ObjectFlags::empty()),
        };
        Some(self.emplace(block, flags, body))
    }

    fn emplace(self: &Arc<Self>, block: Block, flags: ObjectFlags, body: T) -> Object<T> {
        let ptr = block.into_raw().cast::<ObjectInner<T>>();
        // SAFETY: block has the layout of ObjectInner<T> and is uniquely owned
        unsafe {
            ptr.as_ptr().write(ObjectInner {
                header: ObjectHeader {
                    ref_count: AtomicUsize::new(1),
                    flags,
                },
                object_type: Arc::clone(self),
                body,
            });
        }

        self.live_objects.fetch_add(1, Ordering::Relaxed);
        self.total_created.fetch_add(1, Ordering::Relaxed);
        trace!(object_type = %self.name, pooled = flags.contains(ObjectFlags::FROM_POOL), "object created");

        // SAFETY: ptr is initialized with a count of 1 that the Object now owns
        unsafe { Object::from_inner(ptr) }
    }

    #[inline]
    pub(crate) fn run_delete_procedure(&self, body: &mut T, flags: DeleteFlags) {
        if let Some(procedure) = &self.delete_procedure {
            procedure(body, flags);
        }
    }

    /// Hand back the memory of a destroyed object
    ///
    /// # Safety
    ///
    /// `ptr` must be the allocation of an `ObjectInner<T>` of this type whose
    /// contents have already been dropped.
    pub(crate) unsafe fn release_memory(&self, ptr: NonNull<ObjectInner<T>>, flags: ObjectFlags) {
        let block = Block::from_raw(ptr.cast(), Self::layout());
        match &self.pool {
            Some(pool) if flags.contains(ObjectFlags::FROM_POOL) => pool.free(block),
            _ => drop(block),
        }
        self.live_objects.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn deferred_queue(&self) -> Option<&DeferredQueue> {
        self.deferred.as_ref()
    }
}

impl<T> ObjectType<T> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live_objects.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_created(&self) -> u64 {
        self.total_created.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn has_pool(&self) -> bool {
        self.pool.is_some()
    }

    pub fn info(&self) -> ObjectTypeInfo {
        ObjectTypeInfo {
            name: self.name.clone(),
            live_objects: self.live_objects(),
            total_created: self.total_created(),
            object_size: std::mem::size_of::<T>(),
            pool: self.pool.as_ref().map(FreeList::stats),
        }
    }
}

impl<T> std::fmt::Debug for ObjectType<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.name)
            .field("live_objects", &self.live_objects())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Type-erased view used by the registry
pub trait TypeDescriptor: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> ObjectTypeInfo;
}

impl<T: Send + Sync> TypeDescriptor for ObjectType<T> {
    fn name(&self) -> &str {
        ObjectType::name(self)
    }

    fn info(&self) -> ObjectTypeInfo {
        ObjectType::info(self)
    }
}
