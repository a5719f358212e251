// Pointer suite: exclusive, shared/weak and pooled handles through the
// public API.
use basekit::{CastError, ObjectPool, ObjectPtr, SharedPtr, UniquePtr, WeakPtr};
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

struct Tracked {
    drops: Rc<Cell<usize>>,
    id: u32,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn tracked(drops: &Rc<Cell<usize>>, id: u32) -> Tracked {
    Tracked {
        drops: drops.clone(),
        id,
    }
}

// Test: shared/weak lifecycle end to end.
// Verifies: lock fails once all owners are gone and succeeds (adding an
// owner) while one is alive.
#[test]
fn shared_weak_lifecycle() {
    let drops = Rc::new(Cell::new(0));
    let first = SharedPtr::new(tracked(&drops, 1));
    let weak: WeakPtr<Tracked> = first.downgrade();

    let second = weak.lock();
    assert_eq!(first.strong_count(), 2);
    drop(first);
    assert_eq!(second.id, 1);
    assert_eq!(drops.get(), 0);

    drop(second);
    assert_eq!(drops.get(), 1);
    assert!(weak.expired());
    assert!(weak.lock().is_null());
}

// Test: two observers of one pooled object.
// Verifies: destroying the pointee nulls both observers without a crash,
// and both copies answer the null check.
#[test]
fn pooled_object_nulls_both_observers() {
    let drops = Rc::new(Cell::new(0));
    let mut pool = ObjectPool::new();
    let owner = pool.insert(tracked(&drops, 9));
    let observer_a: ObjectPtr<Tracked> = owner;
    let observer_b = observer_a;

    assert_eq!(observer_b.get(&pool).map(|p| p.id), Some(9));
    assert!(pool.destroy(owner));
    assert_eq!(drops.get(), 1);
    assert!(observer_a.get(&pool).is_none());
    assert!(observer_b.get(&pool).is_none());
    assert!(!observer_a.is_alive(&pool));
    assert!(observer_a.is_null(&pool));
    assert!(observer_b.is_null(&pool));
}

// Test: type erasure and recovery on each pointer kind.
// Verifies: the right type comes back, the wrong one is an error naming it.
#[test]
fn checked_casts_across_pointer_kinds() {
    let unique: UniquePtr<dyn Any> = UniquePtr::new(3.5f64).into_any();
    assert_eq!(*unique.downcast::<f64>().unwrap(), 3.5);

    let shared: SharedPtr<dyn Any> = SharedPtr::new(vec![1u8, 2]).into_any();
    let err: CastError = shared.cast::<String>().unwrap_err();
    assert!(err.to.contains("String"));
    assert_eq!(shared.cast::<Vec<u8>>().unwrap().len(), 2);

    let mut pool = ObjectPool::new();
    let erased: ObjectPtr<dyn Any> = pool.insert(17i64).cast_unchecked();
    assert!(erased.cast::<i32>(&pool).is_err());
    assert_eq!(erased.cast::<i64>(&pool).unwrap().get(&pool), Some(&17));
}

// Test: ownership transfer out of a UniquePtr.
// Verifies: take leaves the source null; reset destroys exactly once.
#[test]
fn unique_take_and_reset() {
    let drops = Rc::new(Cell::new(0));
    let mut a = UniquePtr::new(tracked(&drops, 4));
    let mut b = a.take();
    assert!(a.is_null());
    assert!(a.get().is_none());
    assert_eq!(b.id, 4);
    b.reset();
    b.reset();
    assert_eq!(drops.get(), 1);
    assert!(b.is_null());
}
