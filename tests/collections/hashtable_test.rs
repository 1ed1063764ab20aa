/*!
 * Hashtable Tests
 * Scenario coverage and model-based checks against std::collections::HashMap
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use refcore::collections::{Hashtable, SimpleHashtable};
use refcore::core::hash::{hash_bytes_murmur, hash_int32};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct ModuleRecord {
    base: u32,
    name: String,
}

fn module_table(
    capacity: usize,
) -> Hashtable<ModuleRecord, impl Fn(&ModuleRecord, &ModuleRecord) -> bool, impl Fn(&ModuleRecord) -> u32>
{
    Hashtable::new(
        |a: &ModuleRecord, b: &ModuleRecord| a.base == b.base,
        |m: &ModuleRecord| hash_int32(m.base),
        capacity,
    )
}

fn probe(base: u32) -> ModuleRecord {
    ModuleRecord {
        base,
        name: String::new(),
    }
}

#[test]
fn test_identity_hash_insert_ten_remove_one() {
    let mut table = Hashtable::new(|a: &u32, b: &u32| a == b, |k: &u32| *k, 4);
    for key in 1..=10u32 {
        assert!(table.add(key).is_some());
    }
    assert_eq!(table.len(), 10);
    assert_eq!(table.find(&5), Some(&5));

    assert!(table.remove(&5));
    assert_eq!(table.find(&5), None);
    assert_eq!(table.len(), 9);
}

#[test]
fn test_partial_entry_lookup() {
    let mut table = module_table(2);
    for (base, name) in [(0x1000, "ntdll"), (0x2000, "kernel32"), (0x3000, "user32")] {
        table.add(ModuleRecord {
            base,
            name: name.to_string(),
        });
    }

    assert_eq!(table.find(&probe(0x2000)).map(|m| m.name.as_str()), Some("kernel32"));

    table.find_mut(&probe(0x3000)).expect("present").name.push_str(".dll");
    assert_eq!(table.find(&probe(0x3000)).map(|m| m.name.as_str()), Some("user32.dll"));

    let taken = table.take(&probe(0x1000)).expect("present");
    assert_eq!(taken.name, "ntdll");
    assert_eq!(table.len(), 2);
}

#[test]
fn test_resize_preserves_entries() {
    let mut table = module_table(1);
    let initial_capacity = table.capacity();

    for base in 0..500u32 {
        table.add(ModuleRecord {
            base,
            name: format!("module-{}", base),
        });
    }

    assert!(table.capacity() > initial_capacity);
    assert_eq!(table.len(), 500);
    for base in 0..500u32 {
        assert_eq!(table.find(&probe(base)).map(|m| m.name.clone()), Some(format!("module-{}", base)));
    }
}

#[test]
fn test_enumerate_skips_removed_and_restarts() {
    let mut table = Hashtable::new(|a: &u32, b: &u32| a == b, |k: &u32| *k, 8);
    for key in 0..8u32 {
        table.add(key);
    }
    for key in [1u32, 4, 6] {
        table.remove(&key);
    }

    let mut cursor = 0;
    let mut seen = Vec::new();
    while let Some(key) = table.enumerate(&mut cursor) {
        seen.push(*key);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 2, 3, 5, 7]);

    let mut cursor = 0;
    assert!(table.enumerate(&mut cursor).is_some());
}

#[test]
fn test_clear_then_reuse() {
    let mut table = Hashtable::new(
        |a: &String, b: &String| a == b,
        |s: &String| hash_bytes_murmur(s.as_bytes()),
        4,
    );
    for word in ["add", "modify", "remove", "refresh"] {
        table.add(word.to_string());
    }
    let capacity = table.capacity();

    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.find(&"add".to_string()), None);
    assert_eq!(table.capacity(), capacity);

    table.add("add".to_string());
    assert_eq!(table.len(), 1);
    assert_eq!(table.iter().count(), 1);
}

#[test]
fn test_simple_hashtable_keyed_by_handle() {
    let mut handles = SimpleHashtable::new(4);
    for handle in (0x10..0x50usize).step_by(4) {
        handles.add(handle, format!("handle {:#x}", handle));
    }
    assert_eq!(handles.len(), 16);
    assert_eq!(handles.find(0x14).map(String::as_str), Some("handle 0x14"));
    assert_eq!(handles.remove(0x14).as_deref(), Some("handle 0x14"));
    assert!(handles.find(0x14).is_none());
    assert!(handles.add(0x18, String::new()).is_none());
}

#[derive(Debug, Clone)]
enum Op {
    Add(u16),
    Remove(u16),
    Find(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u16..64).prop_map(Op::Add),
        2 => (0u16..64).prop_map(Op::Remove),
        1 => (0u16..64).prop_map(Op::Find),
    ]
}

proptest! {
    #[test]
    fn prop_matches_hashmap_model(ops in proptest::collection::vec(op_strategy(), 1..300), capacity in 0usize..8) {
        // Low-entropy hash to force long bucket chains
        let mut table = Hashtable::new(
            |a: &(u16, u32), b: &(u16, u32)| a.0 == b.0,
            |e: &(u16, u32)| u32::from(e.0 % 5),
            capacity,
        );
        let mut model: HashMap<u16, u32> = HashMap::new();

        for (step, op) in ops.into_iter().enumerate() {
            let step = step as u32;
            match op {
                Op::Add(key) => {
                    let added = table.add((key, step)).is_some();
                    let expected = !model.contains_key(&key);
                    if expected {
                        model.insert(key, step);
                    }
                    prop_assert_eq!(added, expected);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(table.remove(&(key, 0)), model.remove(&key).is_some());
                }
                Op::Find(key) => {
                    prop_assert_eq!(table.find(&(key, 0)).map(|e| e.1), model.get(&key).copied());
                }
            }
            prop_assert_eq!(table.len(), model.len());
        }

        let mut live: Vec<_> = table.iter().map(|e| (e.0, e.1)).collect();
        let mut expected: Vec<_> = model.into_iter().collect();
        live.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(live, expected);
    }
}
