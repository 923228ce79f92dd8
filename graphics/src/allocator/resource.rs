//! Resource kinds the allocator caches and the glue that selects their cache.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::ResourceFactory;
use super::cache::{ResourceCache, ResourceCaches};
use crate::error::GraphicsResult;
use crate::resources::{Buffer, QueryPool, Texture};
use crate::types::{BufferDescriptor, QueryPoolDescriptor, TextureDescriptor};

/// Kind of a cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// [`Texture`] resources.
    Texture,
    /// [`Buffer`] resources.
    Buffer,
    /// [`QueryPool`] resources.
    QueryPool,
}

impl ResourceKind {
    /// All kinds, in sweep order.
    pub const ALL: [ResourceKind; 3] = [Self::Texture, Self::Buffer, Self::QueryPool];

    /// Type name used when tagging new resources.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Texture => "Texture",
            Self::Buffer => "Buffer",
            Self::QueryPool => "QueryPool",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Texture => write!(f, "texture"),
            Self::Buffer => write!(f, "buffer"),
            Self::QueryPool => write!(f, "query pool"),
        }
    }
}

/// Borrowed view of a cached resource of any kind.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    /// A texture.
    Texture(&'a Arc<Texture>),
    /// A buffer.
    Buffer(&'a Arc<Buffer>),
    /// A query pool.
    QueryPool(&'a Arc<QueryPool>),
}

impl ResourceRef<'_> {
    /// Kind of the referenced resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Texture(_) => ResourceKind::Texture,
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::QueryPool(_) => ResourceKind::QueryPool,
        }
    }

    /// Debug name of the referenced resource.
    pub fn name(&self) -> String {
        match self {
            Self::Texture(texture) => texture.name(),
            Self::Buffer(buffer) => buffer.name(),
            Self::QueryPool(pool) => pool.name(),
        }
    }
}

/// A resource type that the [`ResourceAllocator`](super::ResourceAllocator) can cache.
///
/// Each implementor names its descriptor type and statically selects its own
/// cache, so reference updates never need a runtime type check.
pub trait CachedResource: fmt::Debug + Send + Sync + Sized + 'static {
    /// Kind tag used in diagnostics and errors.
    const KIND: ResourceKind;

    /// Value-equality key describing how the resource is created.
    type Descriptor: Clone + Eq + Hash + fmt::Debug + Send + 'static;

    /// The descriptor the resource was actually created with.
    fn actual_descriptor(&self) -> Self::Descriptor;

    /// Tag the resource with a debug name.
    fn set_debug_name(&self, name: String);

    /// Borrow the resource as a kind-tagged reference.
    fn as_resource_ref(resource: &Arc<Self>) -> ResourceRef<'_>;

    /// Create a resource through the factory.
    fn create(
        factory: &dyn ResourceFactory,
        descriptor: &Self::Descriptor,
    ) -> GraphicsResult<Arc<Self>>;

    /// Destroy a resource through the factory.
    fn destroy(factory: &dyn ResourceFactory, resource: Arc<Self>) -> GraphicsResult<()>;

    #[doc(hidden)]
    fn cache(caches: &ResourceCaches) -> &ResourceCache<Self>;

    #[doc(hidden)]
    fn cache_mut(caches: &mut ResourceCaches) -> &mut ResourceCache<Self>;
}

impl CachedResource for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;
    type Descriptor = TextureDescriptor;

    fn actual_descriptor(&self) -> TextureDescriptor {
        *self.descriptor()
    }

    fn set_debug_name(&self, name: String) {
        self.set_name(name);
    }

    fn as_resource_ref(resource: &Arc<Self>) -> ResourceRef<'_> {
        ResourceRef::Texture(resource)
    }

    fn create(
        factory: &dyn ResourceFactory,
        descriptor: &TextureDescriptor,
    ) -> GraphicsResult<Arc<Self>> {
        factory.create_texture(descriptor)
    }

    fn destroy(factory: &dyn ResourceFactory, resource: Arc<Self>) -> GraphicsResult<()> {
        factory.destroy_texture(resource)
    }

    fn cache(caches: &ResourceCaches) -> &ResourceCache<Self> {
        &caches.textures
    }

    fn cache_mut(caches: &mut ResourceCaches) -> &mut ResourceCache<Self> {
        &mut caches.textures
    }
}

impl CachedResource for Buffer {
    const KIND: ResourceKind = ResourceKind::Buffer;
    type Descriptor = BufferDescriptor;

    fn actual_descriptor(&self) -> BufferDescriptor {
        *self.descriptor()
    }

    fn set_debug_name(&self, name: String) {
        self.set_name(name);
    }

    fn as_resource_ref(resource: &Arc<Self>) -> ResourceRef<'_> {
        ResourceRef::Buffer(resource)
    }

    fn create(
        factory: &dyn ResourceFactory,
        descriptor: &BufferDescriptor,
    ) -> GraphicsResult<Arc<Self>> {
        factory.create_buffer(descriptor)
    }

    fn destroy(factory: &dyn ResourceFactory, resource: Arc<Self>) -> GraphicsResult<()> {
        factory.destroy_buffer(resource)
    }

    fn cache(caches: &ResourceCaches) -> &ResourceCache<Self> {
        &caches.buffers
    }

    fn cache_mut(caches: &mut ResourceCaches) -> &mut ResourceCache<Self> {
        &mut caches.buffers
    }
}

impl CachedResource for QueryPool {
    const KIND: ResourceKind = ResourceKind::QueryPool;
    type Descriptor = QueryPoolDescriptor;

    fn actual_descriptor(&self) -> QueryPoolDescriptor {
        *self.descriptor()
    }

    fn set_debug_name(&self, name: String) {
        self.set_name(name);
    }

    fn as_resource_ref(resource: &Arc<Self>) -> ResourceRef<'_> {
        ResourceRef::QueryPool(resource)
    }

    fn create(
        factory: &dyn ResourceFactory,
        descriptor: &QueryPoolDescriptor,
    ) -> GraphicsResult<Arc<Self>> {
        factory.create_query_pool(descriptor)
    }

    fn destroy(factory: &dyn ResourceFactory, resource: Arc<Self>) -> GraphicsResult<()> {
        factory.destroy_query_pool(resource)
    }

    fn cache(caches: &ResourceCaches) -> &ResourceCache<Self> {
        &caches.query_pools
    }

    fn cache_mut(caches: &mut ResourceCaches) -> &mut ResourceCache<Self> {
        &mut caches.query_pools
    }
}
