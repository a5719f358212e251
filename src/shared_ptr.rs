//! SharedPtr / WeakPtr: shared ownership with an observing weak handle.
//!
//! Both wrap the standard single-threaded reference-counted pointer, which
//! already provides the control-block contract: the value is dropped when
//! the strong count goes from 1 to 0, and the counts themselves are freed
//! once the weak count also reaches 0. What this layer adds is a null state,
//! address-based equality and checked downcasting.
//!
//! Neither type is `Send`/`Sync`; sharing across threads needs a different
//! pointer, not an external lock.

use crate::error::CastError;
use core::any::Any;
use core::fmt;
use core::ops::Deref;
use std::rc::{Rc, Weak};

pub struct SharedPtr<T: ?Sized> {
    rc: Option<Rc<T>>,
}

impl<T> SharedPtr<T> {
    pub fn new(value: T) -> Self {
        Self {
            rc: Some(Rc::new(value)),
        }
    }
}

impl<T: ?Sized> SharedPtr<T> {
    pub const fn null() -> Self {
        Self { rc: None }
    }

    pub fn is_null(&self) -> bool {
        self.rc.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.rc.as_deref()
    }

    /// Number of strong owners of the pointee; 0 when null.
    pub fn strong_count(&self) -> usize {
        self.rc.as_ref().map_or(0, Rc::strong_count)
    }

    /// Number of live [`WeakPtr`]s observing the pointee; 0 when null.
    pub fn weak_count(&self) -> usize {
        self.rc.as_ref().map_or(0, Rc::weak_count)
    }

    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr {
            weak: self.rc.as_ref().map(Rc::downgrade),
        }
    }

    /// Whether both pointers share one control block.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.rc, &other.rc) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Drop this owner, leaving the pointer null.
    pub fn reset(&mut self) {
        self.rc = None;
    }

    fn addr(&self) -> *const u8 {
        self.rc
            .as_ref()
            .map_or(core::ptr::null(), |rc| Rc::as_ptr(rc).cast::<u8>())
    }
}

impl<T: Any> SharedPtr<T> {
    /// Erase the static type; the result shares this control block.
    pub fn into_any(self) -> SharedPtr<dyn Any> {
        SharedPtr {
            rc: self.rc.map(|rc| {
                let erased: Rc<dyn Any> = rc;
                erased
            }),
        }
    }
}

impl SharedPtr<dyn Any> {
    /// View the pointee as `U`, sharing the same control block.
    ///
    /// A null pointer casts to null. A type mismatch leaves the counts
    /// untouched and returns a [`CastError`].
    pub fn cast<U: Any>(&self) -> Result<SharedPtr<U>, CastError> {
        let Some(rc) = &self.rc else {
            return Ok(SharedPtr::null());
        };
        match Rc::clone(rc).downcast::<U>() {
            Ok(rc) => Ok(SharedPtr { rc: Some(rc) }),
            Err(_) => Err(CastError::new::<U>(core::any::type_name::<dyn Any>())),
        }
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        Self {
            rc: self.rc.clone(),
        }
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(v) => v,
            None => panic!("dereferenced a null SharedPtr"),
        }
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Compares pointee addresses, not control blocks or values.
impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("SharedPtr").field(&v).finish(),
            None => f.write_str("SharedPtr(null)"),
        }
    }
}

/// Non-owning observer of a [`SharedPtr`] pointee.
pub struct WeakPtr<T: ?Sized> {
    weak: Option<Weak<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// A weak pointer that observes nothing.
    pub const fn new() -> Self {
        Self { weak: None }
    }

    /// Try to become an owner again. Returns a null [`SharedPtr`] once every
    /// strong owner is gone; otherwise the strong count goes up by one.
    pub fn lock(&self) -> SharedPtr<T> {
        SharedPtr {
            rc: self.weak.as_ref().and_then(Weak::upgrade),
        }
    }

    /// Whether the pointee has been destroyed (or was never there).
    pub fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    pub fn strong_count(&self) -> usize {
        self.weak.as_ref().map_or(0, Weak::strong_count)
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        Self {
            weak: self.weak.clone(),
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        shared.downgrade()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("strong", &self.strong_count())
            .finish()
    }
}
