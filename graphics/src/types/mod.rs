//! Descriptor types for cached graphics resources.
//!
//! Descriptors are plain value types. Two descriptors that compare equal describe
//! interchangeable resources, which is what lets the
//! [`ResourceAllocator`](crate::ResourceAllocator) use them as cache keys.

mod buffer;
mod common;
mod query;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::Extent3d;
pub use query::{QueryPoolDescriptor, QueryType};
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
