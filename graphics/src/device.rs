//! Graphics device.
//!
//! The [`GraphicsDevice`] is the resource factory behind the
//! [`ResourceAllocator`](crate::ResourceAllocator). It owns no GPU; it creates
//! CPU-side resource objects, enforces device limits and tracks what is alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::allocator::{ResourceFactory, ResourceLinkInfo, ResourceRef};
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{Buffer, QueryPool, Texture};
use crate::types::{BufferDescriptor, QueryPoolDescriptor, TextureDescriptor};

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum multisample count.
    pub max_sample_count: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
    /// Maximum number of queries in one query pool.
    pub max_query_count: u32,
    /// Required alignment of uniform buffer offsets.
    pub min_uniform_buffer_offset_alignment: u64,
    /// Whether uniform buffers can be bound at an offset into a larger buffer.
    pub uniform_buffer_offsets: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_sample_count: 8,
            max_buffer_size: 1 << 30, // 1 GB
            max_query_count: 4096,
            min_uniform_buffer_offset_alignment: 256,
            uniform_buffer_offsets: true,
        }
    }
}

impl DeviceCapabilities {
    /// Set the uniform buffer offset alignment.
    pub fn with_uniform_alignment(mut self, alignment: u64) -> Self {
        self.min_uniform_buffer_offset_alignment = alignment;
        self
    }

    /// Set whether uniform buffers can be bound at an offset.
    pub fn with_uniform_buffer_offsets(mut self, supported: bool) -> Self {
        self.uniform_buffer_offsets = supported;
        self
    }

    /// Set the maximum multisample count.
    pub fn with_max_sample_count(mut self, count: u32) -> Self {
        self.max_sample_count = count;
        self
    }
}

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new("Dummy Adapter", DeviceCapabilities::default());
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// ```
pub struct GraphicsDevice {
    self_ref: Weak<GraphicsDevice>,
    name: String,
    capabilities: DeviceCapabilities,
    // Track allocated resources (weak references for cleanup/debugging)
    buffers: RwLock<Vec<Weak<Buffer>>>,
    textures: RwLock<Vec<Weak<Texture>>>,
    query_pools: RwLock<Vec<Weak<QueryPool>>>,
    destroyed: AtomicU64,
    not_alive_tags: AtomicU64,
}

impl GraphicsDevice {
    /// Create a new graphics device.
    pub fn new(name: impl Into<String>, capabilities: DeviceCapabilities) -> Arc<Self> {
        let name = name.into();
        log::info!("GraphicsDevice: created '{name}'");
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            name,
            capabilities,
            buffers: RwLock::new(Vec::new()),
            textures: RwLock::new(Vec::new()),
            query_pools: RwLock::new(Vec::new()),
            destroyed: AtomicU64::new(0),
            not_alive_tags: AtomicU64::new(0),
        })
    }

    /// Create a device with default capabilities.
    pub fn dummy() -> Arc<Self> {
        Self::new("Dummy Adapter", DeviceCapabilities::default())
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size is zero or exceeds device limits.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<Arc<Buffer>> {
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }

        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let buffer = Arc::new(Buffer::with_device(self.self_ref.clone(), *descriptor));

        if let Ok(mut buffers) = self.buffers.write() {
            buffers.push(Arc::downgrade(&buffer));
        }

        log::trace!(
            "GraphicsDevice: created buffer, size={} usage={:?}",
            descriptor.size,
            descriptor.usage
        );

        Ok(buffer)
    }

    /// Create a GPU texture.
    ///
    /// The mip count is clamped to the full mip chain and the sample count to the
    /// device maximum, so the resulting texture's descriptor can differ from the
    /// requested one.
    ///
    /// # Errors
    ///
    /// Returns an error if the texture dimensions are zero or exceed device limits.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<Arc<Texture>> {
        let max_dim = self.capabilities.max_texture_dimension;
        if descriptor.size.max_dimension() > max_dim {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimension exceeds maximum {max_dim}"
            )));
        }

        if descriptor.size.width == 0 || descriptor.size.height == 0 || descriptor.size.depth == 0
        {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }

        let mut actual = *descriptor;
        actual.mip_level_count = actual
            .mip_level_count
            .clamp(1, descriptor.full_mip_chain_len());
        actual.sample_count = actual
            .sample_count
            .min(self.capabilities.max_sample_count)
            .max(1);
        if actual != *descriptor {
            log::debug!(
                "GraphicsDevice: adjusted texture descriptor to device limits \
                 (mips {} -> {}, samples {} -> {})",
                descriptor.mip_level_count,
                actual.mip_level_count,
                descriptor.sample_count,
                actual.sample_count
            );
        }

        let texture = Arc::new(Texture::with_device(self.self_ref.clone(), actual));

        if let Ok(mut textures) = self.textures.write() {
            textures.push(Arc::downgrade(&texture));
        }

        log::trace!(
            "GraphicsDevice: created texture, size={}x{}",
            actual.size.width,
            actual.size.height
        );

        Ok(texture)
    }

    /// Create a query pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the query count is zero or exceeds device limits.
    pub fn create_query_pool(
        &self,
        descriptor: &QueryPoolDescriptor,
    ) -> GraphicsResult<Arc<QueryPool>> {
        if descriptor.count == 0 || descriptor.count > self.capabilities.max_query_count {
            return Err(GraphicsError::InvalidParameter(format!(
                "query count {} must be in 1..={}",
                descriptor.count, self.capabilities.max_query_count
            )));
        }

        let pool = Arc::new(QueryPool::with_device(self.self_ref.clone(), *descriptor));

        if let Ok(mut pools) = self.query_pools.write() {
            pools.push(Arc::downgrade(&pool));
        }

        log::trace!(
            "GraphicsDevice: created query pool, type={:?} count={}",
            descriptor.query_type,
            descriptor.count
        );

        Ok(pool)
    }

    /// Get the number of live buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        self.buffers
            .read()
            .map(|b| b.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Get the number of live textures created by this device.
    pub fn texture_count(&self) -> usize {
        self.textures
            .read()
            .map(|t| t.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Get the number of live query pools created by this device.
    pub fn query_pool_count(&self) -> usize {
        self.query_pools
            .read()
            .map(|q| q.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Number of resources destroyed through this device.
    pub fn destroyed_count(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Number of "resource became free" notifications received.
    pub fn not_alive_tag_count(&self) -> u64 {
        self.not_alive_tags.load(Ordering::Relaxed)
    }

    /// Clean up dead weak references to released resources.
    pub fn cleanup_dead_resources(&self) {
        if let Ok(mut buffers) = self.buffers.write() {
            buffers.retain(|w| w.strong_count() > 0);
        }
        if let Ok(mut textures) = self.textures.write() {
            textures.retain(|w| w.strong_count() > 0);
        }
        if let Ok(mut pools) = self.query_pools.write() {
            pools.retain(|w| w.strong_count() > 0);
        }
    }
}

impl ResourceFactory for GraphicsDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<Arc<Texture>> {
        GraphicsDevice::create_texture(self, descriptor)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<Arc<Buffer>> {
        GraphicsDevice::create_buffer(self, descriptor)
    }

    fn create_query_pool(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<Arc<QueryPool>> {
        GraphicsDevice::create_query_pool(self, descriptor)
    }

    fn destroy_texture(&self, texture: Arc<Texture>) -> GraphicsResult<()> {
        texture.mark_destroyed();
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: Arc<Buffer>) -> GraphicsResult<()> {
        buffer.mark_destroyed();
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn destroy_query_pool(&self, query_pool: Arc<QueryPool>) -> GraphicsResult<()> {
        query_pool.mark_destroyed();
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn resource_unreferenced(&self, resource: ResourceRef<'_>, link: &ResourceLinkInfo) {
        // Fence tracking for deferred reuse hangs off this notification.
        self.not_alive_tags.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "GraphicsDevice: {} '{}' is no longer referenced (accesses: {})",
            link.kind,
            resource.name(),
            link.access_total_count
        );
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
