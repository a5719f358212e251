// Allocator accounting checks.
//
// The counters are process-wide, so these tests live in their own binary
// and take LOCK to keep the harness threads from interleaving. Each test
// compares stats() before and after; nothing else in this binary allocates
// through basekit::memory.
#![cfg(debug_assertions)]

use basekit::memory::{self, MemoryStats};
use basekit::{HashMap, ObjectPool, SharedPtr, TreeMap, UniquePtr};
use parking_lot::Mutex;
use proptest::prelude::*;

static LOCK: Mutex<()> = parking_lot::const_mutex(());

fn baseline() -> MemoryStats {
    memory::stats()
}

/// Invariant: accounting is compiled into debug builds.
#[test]
fn accounting_enabled_in_debug() {
    assert!(memory::ACCOUNTING);
}

// Property: Allocate(s) then Free(p) leaves both counters unchanged.
proptest! {
    #[test]
    fn prop_allocate_free_round_trip(size in 1usize..=1 << 16) {
        let _g = LOCK.lock();
        let before = baseline();
        let p = memory::allocate(size).unwrap();
        let during = memory::stats();
        prop_assert_eq!(during.allocations, before.allocations + 1);
        prop_assert_eq!(during.used_bytes, before.used_bytes + size);
        unsafe { memory::free(p.as_ptr()) };
        prop_assert_eq!(memory::stats(), before);
    }
}

/// Invariant: reallocate moves the byte count without changing the block count.
#[test]
fn reallocate_adjusts_bytes_only() {
    let _g = LOCK.lock();
    let before = baseline();
    let p = memory::allocate(10).unwrap();
    let p = unsafe { memory::reallocate(p.as_ptr(), 300) }.unwrap();
    assert_eq!(memory::alloc_count(), before.allocations + 1);
    assert_eq!(memory::used_memory(), before.used_bytes + 300);
    let p = unsafe { memory::reallocate(p.as_ptr(), 4) }.unwrap();
    assert_eq!(memory::used_memory(), before.used_bytes + 4);
    unsafe { memory::free(p.as_ptr()) };
    assert_eq!(memory::stats(), before);
}

/// Invariant: a zero-sized block counts as a block of zero bytes.
#[test]
fn zero_sized_blocks_are_counted() {
    let _g = LOCK.lock();
    let before = baseline();
    let p = memory::allocate(0).unwrap();
    assert_eq!(memory::alloc_count(), before.allocations + 1);
    assert_eq!(memory::used_memory(), before.used_bytes);
    unsafe { memory::free(p.as_ptr()) };
    assert_eq!(memory::stats(), before);
}

/// Invariant: UniquePtr holds exactly one block and gives it back on drop.
#[test]
fn unique_ptr_returns_its_block() {
    let _g = LOCK.lock();
    let before = baseline();
    let mut p = UniquePtr::new([0u64; 4]);
    assert_eq!(memory::alloc_count(), before.allocations + 1);
    assert_eq!(memory::used_memory(), before.used_bytes + 32);
    let q = p.take();
    drop(p);
    assert_eq!(memory::alloc_count(), before.allocations + 1);
    assert_eq!(q.into_inner(), Some([0u64; 4]));
    assert_eq!(memory::stats(), before);
}

/// Invariant: growth, removal, clear and drop of a HashMap leak nothing.
#[test]
fn hash_map_leaks_nothing() {
    let _g = LOCK.lock();
    let before = baseline();
    {
        let mut m: HashMap<u32, u64> = HashMap::new();
        assert_eq!(memory::alloc_count(), before.allocations + 1);
        for i in 0..500 {
            m.insert(i, u64::from(i));
        }
        // Growth swaps the slot array; the old one is released.
        assert_eq!(memory::alloc_count(), before.allocations + 1);
        for i in (0..500).step_by(2) {
            m.remove(&i);
        }
        let copy = m.clone();
        assert_eq!(memory::alloc_count(), before.allocations + 2);
        drop(copy);
        m.clear();
    }
    assert_eq!(memory::stats(), before);
}

/// Invariant: one block per TreeMap node, all released by remove or drop.
#[test]
fn tree_map_one_block_per_node() {
    let _g = LOCK.lock();
    let before = baseline();
    {
        let mut m = TreeMap::new();
        for k in 0..100 {
            m.insert(k, k * 2);
        }
        assert_eq!(memory::alloc_count(), before.allocations + 100);
        for k in 0..40 {
            m.remove(&k);
        }
        assert_eq!(memory::alloc_count(), before.allocations + 60);
        m.retain(|k, _| k % 2 == 0);
        assert_eq!(memory::alloc_count(), before.allocations + 30);
    }
    assert_eq!(memory::stats(), before);
}

/// Invariant: pooled objects hold one block each until destroyed.
#[test]
fn object_pool_releases_on_destroy() {
    let _g = LOCK.lock();
    let before = baseline();
    let mut pool = ObjectPool::new();
    let a = pool.insert(String::from("a"));
    let _b = pool.insert(7u32);
    assert_eq!(memory::alloc_count(), before.allocations + 2);
    pool.destroy(a);
    assert_eq!(memory::alloc_count(), before.allocations + 1);
    pool.clear();
    assert_eq!(memory::stats(), before);
}

/// Invariant: SharedPtr uses the standard reference-counted pointer and does
/// not touch the block counters.
#[test]
fn shared_ptr_is_outside_the_allocator() {
    let _g = LOCK.lock();
    let before = baseline();
    let s = SharedPtr::new(5u8);
    let w = s.downgrade();
    assert_eq!(memory::stats(), before);
    drop(s);
    assert!(w.lock().is_null());
}
