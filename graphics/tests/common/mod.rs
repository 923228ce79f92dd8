//! Common utilities for allocator integration tests.
//!
//! Provides [`TestFactory`], a [`ResourceFactory`] that forwards to a dummy
//! [`GraphicsDevice`] while recording every call, and can be configured to
//! adjust descriptors or fail destruction.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use redlilium_graphics::{
    Buffer, BufferDescriptor, BufferUsage, GraphicsDevice, GraphicsError, GraphicsResult,
    QueryPool, QueryPoolDescriptor, ResourceFactory, ResourceLinkInfo, ResourceRef, Texture,
    TextureDescriptor, TextureFormat, TextureUsage,
};

/// Install a test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A uniform buffer descriptor of `size` bytes.
pub fn uniform(size: u64) -> BufferDescriptor {
    BufferDescriptor::new(size, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
}

/// A 2D render target descriptor.
pub fn render_target(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

/// Resource factory that records what the allocator asks of it.
pub struct TestFactory {
    device: Arc<GraphicsDevice>,
    /// Round buffer sizes up to this granularity, if set.
    buffer_granularity: Option<u64>,
    fail_destroy: AtomicBool,
    fail_next_destroy: AtomicBool,
    created: AtomicU64,
    destroyed: AtomicU64,
    unreferenced: Mutex<HashMap<String, u64>>,
}

impl TestFactory {
    /// A factory that creates resources exactly as requested.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_granularity(None))
    }

    /// A factory that rounds buffer sizes up to `granularity` bytes.
    pub fn rounding_buffers(granularity: u64) -> Arc<Self> {
        Arc::new(Self::with_granularity(Some(granularity)))
    }

    fn with_granularity(buffer_granularity: Option<u64>) -> Self {
        Self {
            device: GraphicsDevice::dummy(),
            buffer_granularity,
            fail_destroy: AtomicBool::new(false),
            fail_next_destroy: AtomicBool::new(false),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            unreferenced: Mutex::new(HashMap::new()),
        }
    }

    /// Make every following destroy call fail.
    pub fn fail_destroy(&self, fail: bool) {
        self.fail_destroy.store(fail, Ordering::SeqCst);
    }

    /// Make only the next destroy call fail.
    pub fn fail_next_destroy(&self) {
        self.fail_next_destroy.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of "no longer referenced" notifications for the named resource.
    pub fn unreferenced_count(&self, name: &str) -> u64 {
        self.unreferenced.lock().get(name).copied().unwrap_or(0)
    }

    /// Total number of "no longer referenced" notifications.
    pub fn unreferenced_total(&self) -> u64 {
        self.unreferenced.lock().values().sum()
    }

    fn destroyed_one(&self) -> GraphicsResult<()> {
        if self.fail_next_destroy.swap(false, Ordering::SeqCst)
            || self.fail_destroy.load(Ordering::SeqCst)
        {
            return Err(GraphicsError::DeviceLost);
        }
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ResourceFactory for TestFactory {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<Arc<Texture>> {
        let texture = self.device.create_texture(descriptor)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(texture)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<Arc<Buffer>> {
        let mut actual = *descriptor;
        if let Some(granularity) = self.buffer_granularity {
            actual.size = actual.size.div_ceil(granularity) * granularity;
        }
        let buffer = self.device.create_buffer(&actual)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(buffer)
    }

    fn create_query_pool(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<Arc<QueryPool>> {
        let pool = self.device.create_query_pool(descriptor)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(pool)
    }

    fn destroy_texture(&self, texture: Arc<Texture>) -> GraphicsResult<()> {
        self.destroyed_one()?;
        ResourceFactory::destroy_texture(&*self.device, texture)
    }

    fn destroy_buffer(&self, buffer: Arc<Buffer>) -> GraphicsResult<()> {
        self.destroyed_one()?;
        ResourceFactory::destroy_buffer(&*self.device, buffer)
    }

    fn destroy_query_pool(&self, query_pool: Arc<QueryPool>) -> GraphicsResult<()> {
        self.destroyed_one()?;
        ResourceFactory::destroy_query_pool(&*self.device, query_pool)
    }

    fn resource_unreferenced(&self, resource: ResourceRef<'_>, link: &ResourceLinkInfo) {
        assert_eq!(link.reference_count, 0);
        *self.unreferenced.lock().entry(resource.name()).or_default() += 1;
    }
}
