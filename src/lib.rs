//! basekit: an instrumented allocator, ownership pointers built on it, and
//! two hand-rolled maps.
//!
//! Summary
//! - Layers, bottom-up:
//!   - `memory`: raw blocks from the system allocator with a size header.
//!     Debug builds (or the `mem-stats` feature) count live blocks and
//!     live bytes process-wide.
//!   - `mem_utils`: typed construction and destruction in those blocks,
//!     single values and arrays, plus the owning `HeapArray<T>`.
//!   - Pointers: `UniquePtr` (exclusive), `SharedPtr`/`WeakPtr`
//!     (reference counted with observers), `ObjectPool`/`ObjectPtr`
//!     (generational handles that read as null once the object dies).
//!   - Containers: `HashMap` (open addressing, quadratic probing,
//!     tombstones, power-of-two growth) and `TreeMap` (AVL with parent
//!     links).
//!
//! Constraints
//! - Single-threaded use is the norm. Only the allocator counters are
//!   shared, and they sit behind a mutex.
//! - Every block handed out is 16-byte aligned; types that need more are
//!   rejected with `MemoryError::UnsupportedAlignment`.
//! - Casting between pointer types is always checked. The unchecked forms
//!   are spelled out (`downcast_unchecked`, `cast_unchecked`).
//!
//! Failure model
//! - Fallible entry points return `Result<_, MemoryError>` (`try_new`,
//!   `try_insert`, ..). The plain forms treat allocator exhaustion like
//!   the standard collections do and abort through `handle_alloc_error`.
//! - Lookups that must not create an entry report a missing key as
//!   `KeyNotFound`; `Index` panics instead.
//!
//! Logging
//! - `tracing` events only, no subscriber is installed here: `error` on
//!   allocator failure, `debug` on a rejected cast, `trace` on hash-map
//!   growth and object destruction.

pub mod error;
pub mod hash_map;
mod hash_map_proptest;
pub mod mem_utils;
pub mod memory;
pub mod object_ptr;
pub mod shared_ptr;
pub mod tree_map;
pub mod unique_ptr;

// Public surface
pub use error::{CastError, Error, KeyNotFound, MemoryError};
pub use hash_map::HashMap;
pub use mem_utils::HeapArray;
pub use memory::MemoryStats;
pub use object_ptr::{ObjectPool, ObjectPtr};
pub use shared_ptr::{SharedPtr, WeakPtr};
pub use tree_map::{Compare, CompareFn, Natural, TreeMap};
pub use unique_ptr::UniquePtr;
