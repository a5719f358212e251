//! Low-level allocator: a thin layer over the system allocator.
//!
//! Every block carries a small header in front of the user pointer that
//! remembers the requested size, so `free` and `reallocate` only need the
//! pointer. When accounting is compiled in (debug builds, or the `mem-stats`
//! feature) each operation also updates two process-wide counters: the
//! number of live blocks and the number of live user bytes.
//!
//! The counters sit behind one `parking_lot::Mutex`. The lock is taken only
//! around the counter update, never around the system allocation itself.
//!
//! Never mix allocators: a pointer from this module must go back through
//! `free`/`reallocate` here, and nothing else may be passed to them.

use crate::error::MemoryError;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Alignment of every block handed out by this allocator.
pub const BLOCK_ALIGN: usize = 16;

/// Bytes reserved in front of every user pointer. Equal to the block
/// alignment so user pointers keep that alignment.
pub const HEADER_SIZE: usize = BLOCK_ALIGN;

/// Whether live-allocation accounting is compiled into this build.
pub const ACCOUNTING: bool = cfg!(any(debug_assertions, feature = "mem-stats"));

#[repr(C)]
struct Header {
    size: usize,
}

/// Snapshot of the accounting counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryStats {
    /// Number of blocks currently allocated.
    pub allocations: usize,
    /// Sum of the requested sizes of those blocks.
    pub used_bytes: usize,
}

#[cfg(any(debug_assertions, feature = "mem-stats"))]
static STATS: parking_lot::Mutex<MemoryStats> = parking_lot::const_mutex(MemoryStats {
    allocations: 0,
    used_bytes: 0,
});

#[inline]
fn record(added_blocks: isize, freed_bytes: usize, added_bytes: usize) {
    #[cfg(any(debug_assertions, feature = "mem-stats"))]
    {
        let mut stats = STATS.lock();
        stats.allocations = stats.allocations.wrapping_add_signed(added_blocks);
        stats.used_bytes = stats.used_bytes - freed_bytes + added_bytes;
    }
    #[cfg(not(any(debug_assertions, feature = "mem-stats")))]
    {
        let _ = (added_blocks, freed_bytes, added_bytes);
    }
}

/// Current accounting counters. All zero when accounting is not compiled in.
pub fn stats() -> MemoryStats {
    #[cfg(any(debug_assertions, feature = "mem-stats"))]
    {
        *STATS.lock()
    }
    #[cfg(not(any(debug_assertions, feature = "mem-stats")))]
    {
        MemoryStats::default()
    }
}

/// Number of live blocks (accounting builds only).
pub fn alloc_count() -> usize {
    stats().allocations
}

/// Number of live user bytes (accounting builds only).
pub fn used_memory() -> usize {
    stats().used_bytes
}

fn block_layout(size: usize) -> Result<Layout, MemoryError> {
    size.checked_add(HEADER_SIZE)
        .and_then(|total| Layout::from_size_align(total, BLOCK_ALIGN).ok())
        .ok_or(MemoryError::LayoutOverflow { count: 1, size })
}

#[inline]
unsafe fn header_of(ptr: *mut u8) -> *mut Header {
    ptr.sub(HEADER_SIZE).cast::<Header>()
}

/// Allocate a block of at least `size` usable bytes, aligned to
/// [`BLOCK_ALIGN`]. A zero-sized request still yields a distinct block.
pub fn allocate(size: usize) -> Result<NonNull<u8>, MemoryError> {
    let layout = block_layout(size)?;
    // SAFETY: the layout is never zero-sized (it includes the header).
    let base = unsafe { alloc::alloc(layout) };
    let Some(base) = NonNull::new(base) else {
        tracing::error!(size, op = "allocate", "system allocator returned null");
        return Err(MemoryError::OutOfMemory { size });
    };
    // SAFETY: base is valid for layout.size() >= HEADER_SIZE bytes and aligned
    // for Header.
    unsafe {
        base.as_ptr().cast::<Header>().write(Header { size });
        record(1, 0, size);
        Ok(NonNull::new_unchecked(base.as_ptr().add(HEADER_SIZE)))
    }
}

/// Release a block. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by [`allocate`] or
/// [`reallocate`], and must not be used afterwards.
pub unsafe fn free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let header = header_of(ptr);
    let size = (*header).size;
    record(-1, size, 0);
    // The layout was validated when the block was created.
    let layout = Layout::from_size_align_unchecked(size + HEADER_SIZE, BLOCK_ALIGN);
    alloc::dealloc(header.cast::<u8>(), layout);
}

/// Resize a block in place or by moving it, preserving the first
/// `min(old, new_size)` bytes. A null `ptr` behaves as [`allocate`].
///
/// On failure the original block is left untouched and still owned by the
/// caller.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by [`allocate`] or
/// [`reallocate`]. On success the old pointer must no longer be used.
pub unsafe fn reallocate(ptr: *mut u8, new_size: usize) -> Result<NonNull<u8>, MemoryError> {
    if ptr.is_null() {
        return allocate(new_size);
    }
    let new_layout = block_layout(new_size)?;
    let header = header_of(ptr);
    let old_size = (*header).size;
    let old_layout = Layout::from_size_align_unchecked(old_size + HEADER_SIZE, BLOCK_ALIGN);
    let base = alloc::realloc(header.cast::<u8>(), old_layout, new_layout.size());
    let Some(base) = NonNull::new(base) else {
        tracing::error!(size = new_size, op = "reallocate", "system allocator returned null");
        return Err(MemoryError::OutOfMemory { size: new_size });
    };
    base.as_ptr().cast::<Header>().write(Header { size: new_size });
    record(0, old_size, new_size);
    Ok(NonNull::new_unchecked(base.as_ptr().add(HEADER_SIZE)))
}

/// Requested size of a live block.
///
/// # Safety
/// `ptr` must be a live pointer returned by [`allocate`] or [`reallocate`].
pub unsafe fn block_size(ptr: NonNull<u8>) -> usize {
    (*header_of(ptr.as_ptr())).size
}

/// Report an allocation failure the way the standard collections do:
/// out-of-memory goes to the global OOM handler, size overflows panic.
#[cold]
pub(crate) fn handle_failure(err: MemoryError) -> ! {
    match err {
        MemoryError::OutOfMemory { size } => match block_layout(size) {
            Ok(layout) => alloc::handle_alloc_error(layout),
            Err(err) => panic!("{err}"),
        },
        other => panic!("{other}"),
    }
}
