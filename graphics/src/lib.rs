//! # RedLilium Graphics
//!
//! Transient GPU resource management for the RedLilium renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ResourceAllocator`] - Descriptor-keyed cache of textures, buffers and query
//!   pools with reference counting and policy-driven recycling
//! - [`BufferPool`] - Linear sub-allocator for per-draw constant data
//! - [`GraphicsDevice`] - Default [`ResourceFactory`] enforcing device limits
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_graphics::{BufferPool, GraphicsDevice, ResourceAllocator};
//!
//! let device = GraphicsDevice::dummy();
//! let allocator = Arc::new(ResourceAllocator::new(device.clone()).with_name("frame"));
//! let mut constants = BufferPool::for_device(allocator.clone(), &device, 64 * 1024)?;
//!
//! loop {
//!     let target = allocator.checkout_texture(&hdr_descriptor)?;
//!     // Record passes, allocate constants...
//!     drop(target);
//!
//!     constants.reset()?;
//!     allocator.recycle()?;
//! }
//! ```

pub mod allocator;
pub mod device;
pub mod error;
pub mod profiling;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use allocator::{
    AllocatorStats, CacheStats, CachedResource, RecyclePolicy, ResourceAllocator, ResourceFactory,
    ResourceKind, ResourceLinkInfo, ResourceRef, TemporaryResource,
};
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::{GraphicsError, GraphicsResult};
pub use resources::{
    Buffer, BufferPool, BufferPoolAllocation, BufferPoolAllocationType, BufferPoolMode, QueryPool,
    Texture,
};
pub use types::{
    BufferDescriptor, BufferUsage, Extent3d, QueryPoolDescriptor, QueryType, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Starts the profiler when the `profiling` feature is enabled. Logging is left
/// to the application, which installs its own `log` backend.
pub fn init() {
    profiling::start();
    log::info!("RedLilium Graphics v{} initialized", VERSION);
}
