/*!
 * Objects
 *
 * Reference-counted heap objects prefixed by a `{type, count, flags}` header.
 *
 * # Lifecycle
 *
 * An `Object<T>` is one holder. Cloning (or `reference`) adds a holder and
 * dropping (or `dereference`) removes one. The holder that takes the count
 * from 1 to 0 runs the type's delete procedure on its own thread, drops the
 * payload and returns the memory to the type's pool or the allocator.
 *
 * # Raw boundary
 *
 * `into_raw`/`from_raw` and the `*_raw` functions work with payload pointers
 * and explicit counts for callers that cannot hold an `Object<T>`.
 */

use super::object_type::ObjectType;
use super::types::{DeleteFlags, ObjectFlags, ObjectHeader};
use std::marker::PhantomData;
use std::mem::{offset_of, ManuallyDrop};
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Counts above this abort, mirroring `Arc`
const MAX_REFCOUNT: usize = isize::MAX as usize;

#[repr(C)]
pub(crate) struct ObjectInner<T> {
    pub header: ObjectHeader,
    pub object_type: Arc<ObjectType<T>>,
    pub body: T,
}

/// Holder of one reference to a typed object
pub struct Object<T: Send + Sync + 'static> {
    ptr: NonNull<ObjectInner<T>>,
    _marker: PhantomData<ObjectInner<T>>,
}

// SAFETY: the count is atomic and the payload is only shared as &T
unsafe impl<T: Send + Sync + 'static> Send for Object<T> {}
unsafe impl<T: Send + Sync + 'static> Sync for Object<T> {}

/// Pointer moved to the deferred-delete worker
struct SendPtr<T>(NonNull<ObjectInner<T>>);

// SAFETY: the sending thread gave up the last reference
unsafe impl<T: Send + Sync> Send for SendPtr<T> {}

impl<T> SendPtr<T> {
    fn get(self) -> NonNull<ObjectInner<T>> {
        self.0
    }
}

impl<T: Send + Sync + 'static> Object<T> {
    /// # Safety
    ///
    /// `ptr` must be a live object and the caller must own one reference.
    #[inline]
    pub(crate) unsafe fn from_inner(ptr: NonNull<ObjectInner<T>>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn inner(&self) -> &ObjectInner<T> {
        // SAFETY: a holder keeps the object alive
        unsafe { self.ptr.as_ref() }
    }

    /// Add a holder
    #[inline]
    pub fn reference(&self) -> Self {
        // SAFETY: self owns a reference, so the count is non-zero
        unsafe { Self::increment(self.ptr, 1) };
        // SAFETY: the increment above belongs to the new holder
        unsafe { Self::from_inner(self.ptr) }
    }

    /// Give up this holder; returns `true` if the object was deleted
    #[inline]
    pub fn dereference(self) -> bool {
        let this = ManuallyDrop::new(self);
        // SAFETY: this holder's reference is released exactly once
        unsafe { Self::release(this.ptr, 1, false) }
    }

    /// Like `dereference`, but a final deletion runs on the deferred worker
    ///
    /// Falls back to deleting on this thread when the type has no worker.
    pub fn dereference_defer_delete(self) -> bool {
        let this = ManuallyDrop::new(self);
        // SAFETY: this holder's reference is released exactly once
        unsafe { Self::release(this.ptr, 1, true) }
    }

    #[inline]
    pub fn reference_count(&self) -> usize {
        self.inner().header.ref_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn object_type(&self) -> &Arc<ObjectType<T>> {
        &self.inner().object_type
    }

    #[inline]
    pub fn flags(&self) -> ObjectFlags {
        self.inner().header.flags
    }

    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Mutable access while this is the only holder
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.inner().header.ref_count.load(Ordering::Acquire) == 1 {
            // SAFETY: no other holder exists and &mut self excludes new ones
            Some(unsafe { &mut (*this.ptr.as_ptr()).body })
        } else {
            None
        }
    }

    /// Leak this holder's reference as a payload pointer
    pub fn into_raw(this: Self) -> NonNull<T> {
        let this = ManuallyDrop::new(this);
        Self::payload(this.ptr)
    }

    /// Reclaim a holder from [`Object::into_raw`]
    ///
    /// # Safety
    ///
    /// `body` must come from `into_raw` on an `Object<T>` of the same `T`, and
    /// the caller must own the reference being reclaimed.
    pub unsafe fn from_raw(body: NonNull<T>) -> Self {
        Self::from_inner(Self::header_of(body))
    }

    /// Add `1` to the count of a raw object
    ///
    /// # Safety
    ///
    /// `body` must point at a live object (count not yet zero).
    #[inline]
    pub unsafe fn reference_raw(body: NonNull<T>) {
        Self::increment(Self::header_of(body), 1);
    }

    /// Add `count` to the count of a raw object
    ///
    /// # Safety
    ///
    /// Same as [`Object::reference_raw`].
    #[inline]
    pub unsafe fn reference_raw_ex(body: NonNull<T>, count: usize) {
        Self::increment(Self::header_of(body), count);
    }

    /// Add `1` unless the count already reached zero
    ///
    /// # Safety
    ///
    /// The memory behind `body` must still be allocated (for example
    /// because a delete procedure that unlinks it has not finished yet).
    pub unsafe fn try_reference_raw(body: NonNull<T>) -> bool {
        let header = &(*Self::header_of(body).as_ptr()).header;
        let mut current = header.ref_count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current >= MAX_REFCOUNT {
                std::process::abort();
            }
            match header.ref_count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Release one reference; returns `true` if the object was deleted
    ///
    /// # Safety
    ///
    /// The caller must own the reference being released.
    #[inline]
    pub unsafe fn dereference_raw(body: NonNull<T>) -> bool {
        Self::release(Self::header_of(body), 1, false)
    }

    /// Release `count` references at once
    ///
    /// # Safety
    ///
    /// The caller must own all `count` references.
    #[inline]
    pub unsafe fn dereference_raw_ex(body: NonNull<T>, count: usize, defer_delete: bool) -> bool {
        Self::release(Self::header_of(body), count, defer_delete)
    }

    #[inline]
    fn payload(ptr: NonNull<ObjectInner<T>>) -> NonNull<T> {
        // SAFETY: body is a field of a live allocation
        unsafe { NonNull::new_unchecked(std::ptr::addr_of_mut!((*ptr.as_ptr()).body)) }
    }

    #[inline]
    unsafe fn header_of(body: NonNull<T>) -> NonNull<ObjectInner<T>> {
        let offset = offset_of!(ObjectInner<T>, body);
        NonNull::new_unchecked(body.as_ptr().cast::<u8>().sub(offset).cast())
    }

    #[inline]
    unsafe fn increment(ptr: NonNull<ObjectInner<T>>, count: usize) {
        let old = (*ptr.as_ptr())
            .header
            .ref_count
            .fetch_add(count, Ordering::Relaxed);
        if old > MAX_REFCOUNT - count.min(MAX_REFCOUNT) {
            std::process::abort();
        }
    }

    unsafe fn release(ptr: NonNull<ObjectInner<T>>, count: usize, defer_delete: bool) -> bool {
        let old = (*ptr.as_ptr())
            .header
            .ref_count
            .fetch_sub(count, Ordering::Release);
        debug_assert!(old >= count, "object dereferenced below zero");
        if old != count {
            return false;
        }

        // Pairs with the Release decrements of every other holder
        fence(Ordering::Acquire);

        if defer_delete {
            let object_type = Arc::clone(&(*ptr.as_ptr()).object_type);
            if let Some(queue) = object_type.deferred_queue() {
                let target = SendPtr(ptr);
                let task = Box::new(move || {
                    // SAFETY: the count reached zero, nothing else touches it
                    unsafe {
                        Self::delete(target.get(), DeleteFlags { deferred: true })
                    }
                });
                if queue.submit(task).is_ok() {
                    return true;
                }
            }
        }

        Self::delete(ptr, DeleteFlags::default());
        true
    }

    #[cold]
    unsafe fn delete(ptr: NonNull<ObjectInner<T>>, flags: DeleteFlags) {
        let object_type = Arc::clone(&(*ptr.as_ptr()).object_type);
        let reclaim = Reclaim {
            ptr,
            header_flags: (*ptr.as_ptr()).header.flags,
            object_type,
        };

        reclaim
            .object_type
            .run_delete_procedure(&mut (*ptr.as_ptr()).body, flags);
        trace!(object_type = %reclaim.object_type.name(), deferred = flags.deferred, "object deleted");
    }
}

/// Drops the payload and frees the memory, also when the delete procedure unwinds
struct Reclaim<T: Send + Sync + 'static> {
    ptr: NonNull<ObjectInner<T>>,
    header_flags: ObjectFlags,
    object_type: Arc<ObjectType<T>>,
}

impl<T: Send + Sync + 'static> Drop for Reclaim<T> {
    fn drop(&mut self) {
        // SAFETY: built only by `delete` once the count reached zero
        unsafe {
            std::ptr::drop_in_place(self.ptr.as_ptr());
            self.object_type.release_memory(self.ptr, self.header_flags);
        }
    }
}

impl<T: Send + Sync + 'static> Clone for Object<T> {
    #[inline]
    fn clone(&self) -> Self {
        self.reference()
    }
}

impl<T: Send + Sync + 'static> Drop for Object<T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: this holder's reference is released exactly once
        unsafe { Self::release(self.ptr, 1, false) };
    }
}

impl<T: Send + Sync + 'static> Deref for Object<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner().body
    }
}

impl<T: Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.object_type().name())
            .field("ref_count", &self.reference_count())
            .field("body", &**self)
            .finish()
    }
}
