/*!
 * Object Lifecycle Tests
 * Reference counting, delete procedures and pooled memory
 */

use pretty_assertions::assert_eq;
use refcore::object::{DeleteFlags, Object, ObjectManager};
use refcore::{PoolParameters, RuntimeConfig, RuntimeError};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

fn manager() -> ObjectManager {
    ObjectManager::with_config(RuntimeConfig::default()).expect("Failed to create manager")
}

#[test]
fn test_n_references_n_dereferences_delete_once() {
    let manager = manager();
    let deletes = Arc::new(AtomicUsize::new(0));
    let sink = deletes.clone();

    let object_type = manager
        .object_type::<Vec<u8>>("Buffer")
        .with_delete_procedure(move |_, _| {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .register()
        .expect("Failed to register type");

    let object = object_type.create_object(vec![1, 2, 3]);
    let holders: Vec<Object<Vec<u8>>> = (0..10).map(|_| object.reference()).collect();
    assert_eq!(object.reference_count(), 11);

    for holder in holders {
        assert!(!holder.dereference());
        assert_eq!(deletes.load(Ordering::SeqCst), 0);
    }

    assert!(object.dereference());
    assert_eq!(deletes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_raw_boundary_round_trip() {
    let manager = manager();
    let deletes = Arc::new(AtomicUsize::new(0));
    let sink = deletes.clone();
    let object_type = manager
        .object_type::<u64>("Counter")
        .with_delete_procedure(move |value, _| {
            assert_eq!(*value, 42);
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .register()
        .expect("Failed to register type");

    let raw = Object::into_raw(object_type.create_object(42));
    unsafe {
        Object::reference_raw(raw);
        assert!(!Object::dereference_raw(raw));
        assert_eq!(*raw.as_ref(), 42);
        assert!(Object::dereference_raw(raw));
    }
    assert_eq!(deletes.load(Ordering::SeqCst), 1);
    assert_eq!(object_type.live_objects(), 0);
}

#[test]
fn test_try_reference_fails_once_deleted_from_procedure() {
    // The count is already zero while the delete procedure runs
    let manager = manager();
    let refused = Arc::new(AtomicUsize::new(0));
    let sink = refused.clone();
    let published = Arc::new(AtomicPtr::<u32>::new(std::ptr::null_mut()));
    let target = published.clone();

    let object_type = manager
        .object_type::<u32>("Lookup")
        .with_delete_procedure(move |_, _| {
            let raw = NonNull::new(target.load(Ordering::SeqCst)).expect("pointer published");
            if !unsafe { Object::try_reference_raw(raw) } {
                sink.fetch_add(1, Ordering::SeqCst);
            }
        })
        .register()
        .expect("Failed to register type");

    let raw = Object::into_raw(object_type.create_object(1));
    published.store(raw.as_ptr(), Ordering::SeqCst);
    assert!(unsafe { Object::<u32>::dereference_raw(raw) });
    assert_eq!(refused.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pool_reuses_memory_across_objects() {
    let manager = ObjectManager::with_config(RuntimeConfig {
        default_pool: Some(PoolParameters::new(4)),
        ..RuntimeConfig::default()
    })
    .expect("Failed to create manager");

    let object_type = manager
        .object_type::<[u64; 8]>("Pooled")
        .default_pool()
        .register()
        .expect("Failed to register type");

    for round in 0..10 {
        let objects: Vec<_> = (0..4).map(|i| object_type.create_object([i + round; 8])).collect();
        drop(objects);
    }

    let info = manager.type_info("Pooled").expect("type registered");
    let pool = info.pool.expect("pool configured");
    assert_eq!(pool.fresh_allocations, 4);
    assert_eq!(pool.reused_allocations, 36);
    assert_eq!(pool.pooled_blocks, 4);
    assert_eq!(info.live_objects, 0);
    assert_eq!(info.total_created, 40);
}

#[test]
fn test_initialization_is_all_or_nothing() {
    let result = ObjectManager::initialize(RuntimeConfig::default(), |m| {
        let process = m.object_type::<u32>("Process").register()?;
        let thread = m.object_type::<u32>("Thread").register()?;
        let duplicate = m.object_type::<u32>("Process").register()?;
        Ok((process, thread, duplicate))
    });

    match result {
        Err(RuntimeError::DuplicateType(name)) => assert_eq!(name, "Process"),
        other => panic!("expected duplicate type error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_deferred_delete_flag_reaches_procedure() {
    let manager = manager();
    let flags_seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = flags_seen.clone();

    let object_type = manager
        .object_type::<String>("Deferred")
        .with_delete_procedure(move |_, flags: DeleteFlags| sink.lock().push(flags.deferred))
        .register()
        .expect("Failed to register type");

    object_type.create_object("inline".into()).dereference();
    object_type
        .create_object("deferred".into())
        .dereference_defer_delete();
    manager.flush_deferred().expect("Failed to flush");

    assert_eq!(*flags_seen.lock(), vec![false, true]);
}

#[test]
fn test_deferred_deletes_complete_when_manager_drops() {
    let deletes = Arc::new(AtomicUsize::new(0));
    let object_type = {
        let manager = manager();
        let sink = deletes.clone();
        let object_type = manager
            .object_type::<u8>("Late")
            .with_delete_procedure(move |_, _| {
                sink.fetch_add(1, Ordering::SeqCst);
            })
            .register()
            .expect("Failed to register type");

        for i in 0..50 {
            object_type.create_object(i).dereference_defer_delete();
        }
        object_type
    };

    assert_eq!(deletes.load(Ordering::SeqCst), 50);

    // Worker is gone, so deferral falls back to the calling thread
    object_type.create_object(0).dereference_defer_delete();
    assert_eq!(deletes.load(Ordering::SeqCst), 51);
}
