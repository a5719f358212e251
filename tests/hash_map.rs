// HashMap public API suite.
//
// Covers the probe and growth guarantees through the public surface only:
// - Lookups after insert/delete/re-insert reflect each key's last operation.
// - Growth past the half-load threshold keeps every entry exactly once.
// - Mutable get-or-create versus read-only try_get.
// - Cursor removal that advances before it removes.
use basekit::{HashMap, KeyNotFound};
use std::collections::HashSet;

// Test: the documented insert/delete/insert scenario.
// Verifies: the deleted key is gone, survivors keep their values.
#[test]
fn probe_consistency_scenario() {
    let mut map = HashMap::new();
    map.insert("a".to_string(), 1);
    map.insert("b".to_string(), 2);
    map.remove("a");
    map.insert("c".to_string(), 3);

    assert!(!map.contains_key("a"));
    assert!(map.contains_key("b"));
    assert!(map.contains_key("c"));
    assert_eq!(map["b"], 2);
    assert_eq!(map["c"], 3);
}

// Test: same keys deleted and re-inserted many times.
// Verifies: the last operation per key wins, regardless of tombstones.
#[test]
fn repeated_delete_reinsert_of_same_keys() {
    let mut map: HashMap<u32, u32> = HashMap::new();
    let mut present = HashSet::new();
    for round in 0..20u32 {
        for k in 0..16u32 {
            if (k + round) % 3 == 0 {
                map.remove(&k);
                present.remove(&k);
            } else {
                map.insert(k, round);
                present.insert(k);
            }
        }
        for k in 0..16u32 {
            assert_eq!(map.contains_key(&k), present.contains(&k), "key {k} round {round}");
        }
        assert_eq!(map.len(), present.len());
    }
}

// Test: crossing the growth threshold many times.
// Verifies: size equals distinct insert count; every key maps to its value.
#[test]
fn growth_keeps_every_entry() {
    let n = 10_000;
    let mut map = HashMap::new();
    for i in 0..n {
        map.insert(format!("key-{i}"), i);
    }
    assert_eq!(map.len(), n);
    for i in 0..n {
        assert_eq!(map.get(format!("key-{i}").as_str()), Some(&i));
    }
    let distinct: HashSet<&String> = map.keys().collect();
    assert_eq!(distinct.len(), n);
}

// Test: the two lookup paths.
// Verifies: try_get never creates; get_or_insert_default always does.
#[test]
fn read_only_versus_creating_lookup() {
    let mut map: HashMap<&str, u32> = HashMap::new();
    assert_eq!(map.try_get("hits"), Err(KeyNotFound));
    assert!(map.is_empty());
    *map.get_or_insert_default("hits") += 1;
    *map.get_or_insert_default("hits") += 1;
    assert_eq!(map.try_get("hits"), Ok(&2));
    let err: basekit::Error = map.try_get("miss").unwrap_err().into();
    assert_eq!(err.to_string(), "key not found");
}

// Test: remove every other entry while walking.
// Verifies: walking continues past removed entries and touches each once.
#[test]
fn cursor_walk_and_remove() {
    let mut map: HashMap<i32, i32> = (0..100).map(|i| (i, i)).collect();
    let mut visited = 0;
    let mut cursor = map.cursor_mut();
    while let Some(&k) = cursor.key() {
        visited += 1;
        if k % 2 == 0 {
            cursor.remove_current();
        } else {
            cursor.move_next();
        }
    }
    assert_eq!(visited, 100);
    assert_eq!(map.len(), 50);
    assert!(map.keys().all(|k| k % 2 == 1));
}

// Test: collection traits.
// Verifies: FromIterator/Extend/Clone/Eq/Debug agree on contents.
#[test]
fn collection_traits() {
    let mut a: HashMap<u8, char> = [(1, 'a'), (2, 'b')].into_iter().collect();
    let b = a.clone();
    assert_eq!(a, b);
    a.extend([(3, 'c')]);
    assert_ne!(a, b);
    assert_eq!(a.len(), 3);
    let single: HashMap<u8, u8> = [(9, 9)].into_iter().collect();
    assert_eq!(format!("{single:?}"), "{9: 9}");
    let total: u32 = (&a).into_iter().map(|(k, _)| u32::from(*k)).sum();
    assert_eq!(total, 6);
}
