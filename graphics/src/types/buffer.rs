//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
        /// Buffer is mappable for CPU access.
        const MAP_READ = 1 << 7;
        /// Buffer is mappable for CPU write.
        const MAP_WRITE = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl BufferUsage {
    /// Returns true if the buffer can be mapped for CPU access.
    pub fn is_mappable(&self) -> bool {
        self.intersects(Self::MAP_READ | Self::MAP_WRITE)
    }
}

/// Descriptor for creating a buffer.
///
/// Used as the cache key for temporary buffers, so it only holds the fields
/// that affect how the buffer is created. Debug names live on the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }

    /// Descriptor for a small uniform buffer written from the CPU each frame.
    pub fn uniform(size: u64) -> Self {
        Self::new(size, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mappable_usage() {
        assert!(BufferUsage::MAP_WRITE.is_mappable());
        assert!((BufferUsage::UNIFORM | BufferUsage::MAP_READ).is_mappable());
        assert!(!BufferUsage::UNIFORM.is_mappable());
    }

    #[test]
    fn test_descriptor_equality_is_structural() {
        let a = BufferDescriptor::new(256, BufferUsage::UNIFORM);
        let b = BufferDescriptor::new(256, BufferUsage::UNIFORM);
        let c = BufferDescriptor::new(256, BufferUsage::STORAGE);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
