//! GPU buffer resource.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{BufferDescriptor, BufferUsage};

/// CPU-visible contents of a buffer and its mapping state.
#[derive(Default)]
struct BufferMemory {
    // Allocated on first write so large cached buffers stay cheap.
    data: Vec<u8>,
    mapped: bool,
}

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] (or any other
/// [`ResourceFactory`](crate::ResourceFactory)) and are reference-counted.
/// They hold a weak reference back to their parent device.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// println!("Buffer size: {}", buffer.size());
/// ```
pub struct Buffer {
    device: Weak<GraphicsDevice>,
    descriptor: BufferDescriptor,
    name: RwLock<String>,
    memory: Mutex<BufferMemory>,
    destroyed: AtomicBool,
}

impl Buffer {
    /// Create a buffer that is not owned by a [`GraphicsDevice`].
    ///
    /// Intended for custom [`ResourceFactory`](crate::ResourceFactory) implementations.
    pub fn new(descriptor: BufferDescriptor) -> Self {
        Self::with_device(Weak::new(), descriptor)
    }

    /// Create a new buffer (called by GraphicsDevice).
    pub(crate) fn with_device(device: Weak<GraphicsDevice>, descriptor: BufferDescriptor) -> Self {
        Self {
            device,
            descriptor,
            name: RwLock::new(String::new()),
            memory: Mutex::new(BufferMemory::default()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the buffer usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the debug name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Set the debug name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Returns true once the owning factory destroyed this buffer.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_destroyed(&self) {
        self.memory.lock().mapped = false;
        self.destroyed.store(true, Ordering::Release);
    }

    /// Returns true while the buffer is mapped for CPU access.
    pub fn is_mapped(&self) -> bool {
        self.memory.lock().mapped
    }

    /// Map the buffer for CPU access. Mapping a mapped buffer does nothing.
    ///
    /// # Errors
    ///
    /// Fails if the buffer was not created with a `MAP_*` usage or was destroyed.
    pub fn map(&self) -> GraphicsResult<()> {
        if !self.descriptor.usage.is_mappable() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer '{}' was not created with a mappable usage",
                self.name()
            )));
        }
        if self.is_destroyed() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer '{}' was destroyed",
                self.name()
            )));
        }
        self.memory.lock().mapped = true;
        Ok(())
    }

    /// Unmap the buffer. Unmapping an unmapped buffer does nothing.
    pub fn unmap(&self) {
        self.memory.lock().mapped = false;
    }

    /// Write through the CPU mapping at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::BufferNotMapped`] if the buffer is not mapped, or
    /// [`GraphicsError::InvalidParameter`] if the range is out of bounds.
    pub fn write(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        let mut memory = self.memory.lock();
        if !memory.mapped {
            return Err(GraphicsError::BufferNotMapped);
        }
        self.copy_into(&mut memory, offset, data)
    }

    /// Upload data at `offset` through the queue, without mapping.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the range is out of bounds.
    pub fn upload(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        let mut memory = self.memory.lock();
        self.copy_into(&mut memory, offset, data)
    }

    /// Read back a copy of `len` bytes starting at `offset`.
    ///
    /// Bytes that were never written read as zero.
    pub fn read(&self, offset: u64, len: u64) -> GraphicsResult<Vec<u8>> {
        let range = self.checked_range(offset, len)?;
        let memory = self.memory.lock();
        let mut out = vec![0u8; range.len()];
        if !memory.data.is_empty() {
            out.copy_from_slice(&memory.data[range]);
        }
        Ok(out)
    }

    fn copy_into(
        &self,
        memory: &mut BufferMemory,
        offset: u64,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let range = self.checked_range(offset, data.len() as u64)?;
        if memory.data.is_empty() {
            memory.data = vec![0u8; self.descriptor.size as usize];
        }
        memory.data[range].copy_from_slice(data);
        Ok(())
    }

    fn checked_range(&self, offset: u64, len: u64) -> GraphicsResult<std::ops::Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.descriptor.size => Ok(offset as usize..end as usize),
            _ => Err(GraphicsError::InvalidParameter(format!(
                "range {offset}+{len} is out of bounds for buffer of {} bytes",
                self.descriptor.size
            ))),
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &*self.name.read())
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
