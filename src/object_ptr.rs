//! ObjectPool / ObjectPtr: observer handles that read as null once their
//! pointee is destroyed.
//!
//! Objects live in an `ObjectPool`, one allocator block each. An `ObjectPtr`
//! is a small `(index, generation)` handle into that pool. Destroying an
//! object bumps its slot generation, so every outstanding copy of every
//! handle to it resolves to `None` from then on; nothing has to walk a list
//! of observers, and handles may be copied freely by value.

use crate::error::{CastError, MemoryError};
use crate::unique_ptr::UniquePtr;
use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use slotmap::{DefaultKey, Key, SlotMap};

struct Object {
    value: UniquePtr<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

/// Owner of every object reachable through [`ObjectPtr`]s.
pub struct ObjectPool {
    objects: SlotMap<DefaultKey, Object>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn insert<T: Any>(&mut self, value: T) -> ObjectPtr<T> {
        let object = Object {
            value: UniquePtr::new(value).into_any(),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        };
        ObjectPtr::from_key(self.objects.insert(object))
    }

    pub fn try_insert<T: Any>(&mut self, value: T) -> Result<ObjectPtr<T>, MemoryError> {
        let object = Object {
            value: UniquePtr::try_new(value)?.into_any(),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        };
        Ok(ObjectPtr::from_key(self.objects.insert(object)))
    }

    /// Destroy the pointee. Every handle to it, including copies made before
    /// this call, reads as null afterwards. Returns false if it was already
    /// gone.
    pub fn destroy<T: ?Sized>(&mut self, ptr: ObjectPtr<T>) -> bool {
        let Some(key) = ptr.key else {
            return false;
        };
        // Unlink first so the pointee's destructor runs with the slot
        // already stale.
        match self.objects.remove(key) {
            Some(object) => {
                tracing::trace!(object = object.type_name, "object destroyed");
                drop(object);
                true
            }
            None => false,
        }
    }

    /// Move the pointee out of the pool. Handles read as null afterwards.
    /// `None` if the object is gone or is not a `T`.
    pub fn remove<T: Any>(&mut self, ptr: ObjectPtr<T>) -> Option<T> {
        let key = ptr.key?;
        if self.objects.get(key)?.type_id != TypeId::of::<T>() {
            return None;
        }
        let object = self.objects.remove(key)?;
        object.value.downcast::<T>().ok()?.into_inner()
    }

    pub fn get<T: Any>(&self, ptr: ObjectPtr<T>) -> Option<&T> {
        self.objects.get(ptr.key?)?.value.get()?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, ptr: ObjectPtr<T>) -> Option<&mut T> {
        self.objects
            .get_mut(ptr.key?)?
            .value
            .get_mut()?
            .downcast_mut::<T>()
    }

    pub fn is_alive<T: ?Sized>(&self, ptr: ObjectPtr<T>) -> bool {
        ptr.key.is_some_and(|k| self.objects.contains_key(k))
    }

    /// Destroy every object.
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.objects.values().map(|o| o.type_name))
            .finish()
    }
}

/// Handle to an object in an [`ObjectPool`], typed as `T`.
pub struct ObjectPtr<T: ?Sized> {
    key: Option<DefaultKey>,
    _ty: PhantomData<fn() -> *const T>,
}

impl<T: ?Sized> ObjectPtr<T> {
    fn from_key(key: DefaultKey) -> Self {
        Self {
            key: Some(key),
            _ty: PhantomData,
        }
    }

    pub const fn null() -> Self {
        Self {
            key: None,
            _ty: PhantomData,
        }
    }

    /// True for a handle that never pointed anywhere, was reset, or whose
    /// object has been destroyed in `pool`.
    pub fn is_null(&self, pool: &ObjectPool) -> bool {
        !pool.is_alive(*self)
    }

    pub fn is_alive(&self, pool: &ObjectPool) -> bool {
        pool.is_alive(*self)
    }

    pub fn reset(&mut self) {
        self.key = None;
    }

    /// Re-type the handle without checking. Accesses through the result still
    /// check the dynamic type and yield `None` on a mismatch.
    pub fn cast_unchecked<U: ?Sized>(&self) -> ObjectPtr<U> {
        ObjectPtr {
            key: self.key,
            _ty: PhantomData,
        }
    }

    /// Re-type the handle after checking the pointee is a `U`. A null or
    /// dead handle casts to null.
    pub fn cast<U: Any>(&self, pool: &ObjectPool) -> Result<ObjectPtr<U>, CastError> {
        let Some(object) = self.key.and_then(|k| pool.objects.get(k)) else {
            return Ok(ObjectPtr::null());
        };
        if object.type_id == TypeId::of::<U>() {
            Ok(self.cast_unchecked())
        } else {
            Err(CastError::new::<U>(object.type_name))
        }
    }
}

impl<T: Any> ObjectPtr<T> {
    pub fn get<'a>(&self, pool: &'a ObjectPool) -> Option<&'a T> {
        pool.get(*self)
    }

    pub fn get_mut<'a>(&self, pool: &'a mut ObjectPool) -> Option<&'a mut T> {
        pool.get_mut(*self)
    }
}

impl<T: ?Sized> Clone for ObjectPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ObjectPtr<T> {}

impl<T: ?Sized> Default for ObjectPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<ObjectPtr<U>> for ObjectPtr<T> {
    fn eq(&self, other: &ObjectPtr<U>) -> bool {
        self.key == other.key
    }
}

impl<T: ?Sized> Eq for ObjectPtr<T> {}

impl<T: ?Sized> Hash for ObjectPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for ObjectPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(k) => write!(f, "ObjectPtr({:?})", k.data()),
            None => f.write_str("ObjectPtr(null)"),
        }
    }
}
