//! The device-side collaborator of the allocator.

use std::sync::Arc;

use super::{ResourceLinkInfo, ResourceRef};
use crate::error::GraphicsResult;
use crate::resources::{Buffer, QueryPool, Texture};
use crate::types::{BufferDescriptor, QueryPoolDescriptor, TextureDescriptor};

/// Creates and destroys the resources cached by a
/// [`ResourceAllocator`](super::ResourceAllocator).
///
/// A factory may adjust a descriptor while creating a resource (for example to
/// respect hardware limits). The allocator files the resource under the
/// descriptor the resource reports, not the requested one.
///
/// All methods are called with the allocator lock held and must not call back
/// into the same allocator.
pub trait ResourceFactory: Send + Sync {
    /// Create a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<Arc<Texture>>;

    /// Create a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<Arc<Buffer>>;

    /// Create a query pool.
    fn create_query_pool(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<Arc<QueryPool>>;

    /// Destroy a texture evicted from or torn down with the cache.
    fn destroy_texture(&self, texture: Arc<Texture>) -> GraphicsResult<()>;

    /// Destroy a buffer evicted from or torn down with the cache.
    fn destroy_buffer(&self, buffer: Arc<Buffer>) -> GraphicsResult<()>;

    /// Destroy a query pool evicted from or torn down with the cache.
    fn destroy_query_pool(&self, query_pool: Arc<QueryPool>) -> GraphicsResult<()>;

    /// Called when a cached resource's reference count drops to zero.
    ///
    /// Fence-based deferred reuse hooks in here.
    fn resource_unreferenced(&self, _resource: ResourceRef<'_>, _link: &ResourceLinkInfo) {}
}
