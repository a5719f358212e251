//! Typed allocation on top of [`crate::memory`].
//!
//! These are the building blocks the pointers and containers use to put
//! values into allocator blocks and take them back out. The raw helpers are
//! `unsafe` and work on `NonNull`; [`HeapArray`] is the owning, safe face of
//! `new_array`/`delete_array`.

use crate::error::MemoryError;
use crate::memory::{self, BLOCK_ALIGN};
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

#[inline]
fn check_align<T>() -> Result<(), MemoryError> {
    if align_of::<T>() > BLOCK_ALIGN {
        return Err(MemoryError::UnsupportedAlignment {
            align: align_of::<T>(),
        });
    }
    Ok(())
}

#[inline]
fn array_bytes<T>(count: usize) -> Result<usize, MemoryError> {
    count
        .checked_mul(size_of::<T>())
        .ok_or(MemoryError::LayoutOverflow {
            count,
            size: size_of::<T>(),
        })
}

/// Move `value` into a freshly allocated block.
pub fn new<T>(value: T) -> Result<NonNull<T>, MemoryError> {
    check_align::<T>()?;
    let block = memory::allocate(size_of::<T>())?.cast::<T>();
    // SAFETY: block is sized and aligned for T.
    unsafe { block.as_ptr().write(value) };
    Ok(block)
}

/// Destroy the value behind `ptr` and release its block. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or come from [`new`] (possibly unsized afterwards) and
/// hold a live value; it must not be used again.
pub unsafe fn delete<T: ?Sized>(ptr: *mut T) {
    if ptr.is_null() {
        return;
    }
    ptr::drop_in_place(ptr);
    memory::free(ptr.cast::<u8>());
}

/// Move the value out of a block from [`new`] and release the block
/// without running the value's destructor.
///
/// # Safety
/// `ptr` must come from [`new`], hold a live value, and not be used again.
pub unsafe fn reclaim<T>(ptr: NonNull<T>) -> T {
    let value = ptr.as_ptr().read();
    memory::free(ptr.as_ptr().cast::<u8>());
    value
}

/// Allocate `count` elements, each built by `f`.
///
/// If `f` panics, the elements already built are dropped and the block is
/// released before the panic continues.
pub fn new_array<T, F>(count: usize, mut f: F) -> Result<NonNull<T>, MemoryError>
where
    F: FnMut() -> T,
{
    check_align::<T>()?;
    let block = memory::allocate(array_bytes::<T>(count)?)?.cast::<T>();
    let mut guard = PartialArray {
        ptr: block,
        built: 0,
        release: true,
    };
    while guard.built < count {
        // SAFETY: guard.built < count, so the slot is inside the block.
        unsafe { block.as_ptr().add(guard.built).write(f()) };
        guard.built += 1;
    }
    core::mem::forget(guard);
    Ok(block)
}

/// Allocate `count` clones of `value`.
pub fn new_array_cloned<T: Clone>(count: usize, value: &T) -> Result<NonNull<T>, MemoryError> {
    new_array(count, || value.clone())
}

/// Destroy `count` elements and release the block.
///
/// # Safety
/// `ptr` must come from [`new_array`] or [`resize_array`] and hold exactly
/// `count` live elements; it must not be used again.
pub unsafe fn delete_array<T>(ptr: NonNull<T>, count: usize) {
    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr.as_ptr(), count));
    memory::free(ptr.as_ptr().cast::<u8>());
}

/// Change the element count of an array block.
///
/// Shrinking drops the trailing `old_count - new_count` elements and then
/// gives the tail back to the allocator; if the allocator cannot shrink the
/// block, the larger block is kept (shrinking never fails). Growing
/// reallocates first and then builds the new trailing elements with `f`.
/// Returns the possibly moved pointer.
///
/// # Safety
/// `ptr` must come from [`new_array`] or [`resize_array`] and hold exactly
/// `old_count` live elements. After `Ok`, only the returned pointer is valid.
/// After `Err`, `ptr` is untouched. If `f` panics while growing, the new
/// trailing elements built so far are dropped, and the block (now holding
/// `old_count` elements at an address the caller does not know) is leaked.
pub unsafe fn resize_array<T, F>(
    ptr: NonNull<T>,
    old_count: usize,
    new_count: usize,
    mut f: F,
) -> Result<NonNull<T>, MemoryError>
where
    F: FnMut() -> T,
{
    if new_count == old_count {
        return Ok(ptr);
    }
    if new_count < old_count {
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
            ptr.as_ptr().add(new_count),
            old_count - new_count,
        ));
        let bytes = new_count * size_of::<T>();
        return Ok(memory::reallocate(ptr.as_ptr().cast::<u8>(), bytes)
            .map(NonNull::cast::<T>)
            .unwrap_or(ptr));
    }
    let bytes = array_bytes::<T>(new_count)?;
    let block = memory::reallocate(ptr.as_ptr().cast::<u8>(), bytes)?.cast::<T>();
    let mut guard = PartialArray {
        ptr: NonNull::new_unchecked(block.as_ptr().add(old_count)),
        built: 0,
        release: false,
    };
    while old_count + guard.built < new_count {
        guard.ptr.as_ptr().add(guard.built).write(f());
        guard.built += 1;
    }
    core::mem::forget(guard);
    Ok(block)
}

/// Unwind guard over a run of elements under construction.
struct PartialArray<T> {
    ptr: NonNull<T>,
    built: usize,
    release: bool,
}

impl<T> Drop for PartialArray<T> {
    fn drop(&mut self) {
        // SAFETY: exactly `built` elements were written starting at ptr.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.built));
            if self.release {
                memory::free(self.ptr.as_ptr().cast::<u8>());
            }
        }
    }
}

/// Fixed-length array living in one allocator block.
pub struct HeapArray<T> {
    ptr: NonNull<T>,
    len: usize,
    _owns: PhantomData<T>,
}

// SAFETY: HeapArray uniquely owns its elements, like Box<[T]>.
unsafe impl<T: Send> Send for HeapArray<T> {}
unsafe impl<T: Sync> Sync for HeapArray<T> {}

impl<T> HeapArray<T> {
    /// Build `len` elements with `f`.
    pub fn new_with<F>(len: usize, f: F) -> Result<Self, MemoryError>
    where
        F: FnMut() -> T,
    {
        let ptr = new_array(len, f)?;
        Ok(Self {
            ptr,
            len,
            _owns: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Deref for HeapArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: ptr is aligned, non-null and holds len live elements.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for HeapArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in deref, and &mut self gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> Drop for HeapArray<T> {
    fn drop(&mut self) {
        // SAFETY: the block holds exactly len live elements and is not reused.
        unsafe { delete_array(self.ptr, self.len) }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for HeapArray<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
