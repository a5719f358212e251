//! UniquePtr: exclusive ownership of one allocator block.

use crate::error::{CastError, MemoryError};
use crate::mem_utils;
use crate::memory;
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

/// Single owner of a value stored in a [`crate::memory`] block.
///
/// Can be null (default, after [`take`](Self::take) or
/// [`release`](Self::release)). Dropping a non-null pointer destroys the
/// value and frees its block. Dereferencing a null pointer panics.
pub struct UniquePtr<T: ?Sized> {
    ptr: Option<NonNull<T>>,
    _owns: PhantomData<T>,
}

// SAFETY: UniquePtr uniquely owns its pointee, like Box<T>.
unsafe impl<T: ?Sized + Send> Send for UniquePtr<T> {}
unsafe impl<T: ?Sized + Sync> Sync for UniquePtr<T> {}

impl<T> UniquePtr<T> {
    pub fn new(value: T) -> Self {
        Self::try_new(value).unwrap_or_else(|e| memory::handle_failure(e))
    }

    pub fn try_new(value: T) -> Result<Self, MemoryError> {
        let ptr = mem_utils::new(value)?;
        Ok(Self {
            ptr: Some(ptr),
            _owns: PhantomData,
        })
    }

    /// Move the value out and free the block. `None` when null.
    pub fn into_inner(self) -> Option<T> {
        // SAFETY: a released pointer came from mem_utils::new and is owned.
        self.release().map(|p| unsafe { mem_utils::reclaim(p) })
    }
}

impl<T: ?Sized> UniquePtr<T> {
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _owns: PhantomData,
        }
    }

    /// Take ownership of a raw pointer previously obtained from
    /// [`release`](Self::release).
    ///
    /// # Safety
    /// `ptr` must come from `release` (or `mem_utils::new`) and must not be
    /// owned by anything else.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr: Some(ptr),
            _owns: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-null pointer refers to a live, owned value.
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: as in get, and &mut self gives exclusive access.
        self.ptr.map(|p| unsafe { &mut *p.as_ptr() })
    }

    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Give up ownership without destroying the value. The caller becomes
    /// responsible for eventually passing the pointer to `mem_utils::delete`
    /// or back to [`from_raw`](Self::from_raw).
    pub fn release(mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Move ownership out, leaving this pointer null.
    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
            _owns: PhantomData,
        }
    }

    /// Destroy the current value, if any, leaving this pointer null.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    fn addr(&self) -> *const u8 {
        self.ptr
            .map_or(core::ptr::null(), |p| p.as_ptr().cast::<u8>().cast_const())
    }
}

impl<T: Any> UniquePtr<T> {
    /// Erase the static type so the value can later be downcast.
    pub fn into_any(self) -> UniquePtr<dyn Any> {
        let ptr = self.release().map(|p| {
            let erased: NonNull<dyn Any> = p;
            erased
        });
        UniquePtr {
            ptr,
            _owns: PhantomData,
        }
    }
}

impl UniquePtr<dyn Any> {
    /// Recover the concrete type.
    ///
    /// The source is consumed whatever the outcome: on a type mismatch the
    /// value is destroyed and a [`CastError`] returned. A null source casts
    /// to a null pointer.
    pub fn downcast<U: Any>(self) -> Result<UniquePtr<U>, CastError> {
        let matches = match self.get() {
            None => return Ok(UniquePtr::null()),
            Some(v) => v.is::<U>(),
        };
        if matches {
            // SAFETY: the dynamic type was just checked.
            Ok(unsafe { self.downcast_unchecked::<U>() })
        } else {
            Err(CastError::new::<U>(core::any::type_name::<dyn Any>()))
        }
    }

    /// Reinterpret the pointee as `U` without checking.
    ///
    /// # Safety
    /// The value must actually be a `U`.
    pub unsafe fn downcast_unchecked<U: Any>(self) -> UniquePtr<U> {
        UniquePtr {
            ptr: self.release().map(NonNull::cast::<U>),
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for UniquePtr<T> {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: the pointer is owned and came from mem_utils::new.
            unsafe { mem_utils::delete(p.as_ptr()) }
        }
    }
}

impl<T: ?Sized> Deref for UniquePtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(v) => v,
            None => panic!("dereferenced a null UniquePtr"),
        }
    }
}

impl<T: ?Sized> DerefMut for UniquePtr<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(v) => v,
            None => panic!("dereferenced a null UniquePtr"),
        }
    }
}

impl<T: ?Sized> Default for UniquePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Address identity, like comparing the raw pointers.
impl<T: ?Sized, U: ?Sized> PartialEq<UniquePtr<U>> for UniquePtr<T> {
    fn eq(&self, other: &UniquePtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for UniquePtr<T> {}

impl<T: ?Sized + fmt::Debug> fmt::Debug for UniquePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("UniquePtr").field(&v).finish(),
            None => f.write_str("UniquePtr(null)"),
        }
    }
}
