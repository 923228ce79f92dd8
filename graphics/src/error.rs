//! Graphics error types.

use thiserror::Error;

use crate::allocator::ResourceKind;

/// Errors that can occur in the graphics system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A reference count update would make the count negative.
    ///
    /// This is a double release or a release without a matching checkout.
    #[error(
        "invalid delta on reference count, it must be non-negative after updating \
         (current: {current}, delta: {delta})"
    )]
    ReferenceCountUnderflow {
        /// Reference count before the update.
        current: u32,
        /// Requested change.
        delta: i32,
    },
    /// The resource is not tracked by the allocator it was handed to.
    #[error("{kind} was not allocated by this allocator")]
    ResourceNotOwned {
        /// Kind of the offending resource.
        kind: ResourceKind,
    },
    /// A buffer pool allocation did not fit in the remaining space.
    #[error("buffer pool exhausted: requested {requested} bytes at cursor {cursor}, pool size is {size}")]
    PoolExhausted {
        /// Requested allocation size in bytes.
        requested: u64,
        /// Pool cursor at the time of the request.
        cursor: u64,
        /// Total pool size in bytes.
        size: u64,
    },
    /// CPU access to a buffer that is not mapped.
    #[error("buffer is not mapped")]
    BufferNotMapped,
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;
