//! GPU resources.
//!
//! This module contains the resource types handed out by a
//! [`ResourceFactory`](crate::ResourceFactory) such as [`GraphicsDevice`]:
//! - [`Buffer`] - GPU memory buffer
//! - [`Texture`] - GPU texture/image
//! - [`QueryPool`] - Pool of GPU queries
//! - [`BufferPool`] - Linear sub-allocator for per-frame upload data
//!
//! Resources are reference-counted with [`Arc`] and can be shared across threads.
//! Each resource holds a weak reference back to its parent device.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;
mod buffer_pool;
mod query_pool;
mod texture;

pub use buffer::Buffer;
pub use buffer_pool::{BufferPool, BufferPoolAllocation, BufferPoolAllocationType, BufferPoolMode};
pub use query_pool::QueryPool;
pub use texture::Texture;
