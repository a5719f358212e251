//! Error taxonomy shared by the allocator, the pointers and the maps.

use thiserror::Error;

/// Failure of a raw or typed allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum MemoryError {
    #[error("out of memory: system allocator refused {size} bytes")]
    OutOfMemory { size: usize },
    #[error("allocation size overflow: {count} elements of {size} bytes")]
    LayoutOverflow { count: usize, size: usize },
    #[error("alignment {align} exceeds the allocator block alignment")]
    UnsupportedAlignment { align: usize },
}

/// Dynamic type of a pointee did not match the requested static type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("cannot cast from {from} to {to}")]
pub struct CastError {
    pub from: &'static str,
    pub to: &'static str,
}

impl CastError {
    pub(crate) fn new<To: ?Sized>(from: &'static str) -> Self {
        let err = Self {
            from,
            to: core::any::type_name::<To>(),
        };
        tracing::debug!(from = err.from, to = err.to, "downcast rejected");
        err
    }
}

/// Immutable lookup of a key that is not in the map.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("key not found")]
pub struct KeyNotFound;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    KeyNotFound(#[from] KeyNotFound),
}
