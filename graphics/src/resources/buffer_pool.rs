//! Linear sub-allocator for short-lived upload memory.
//!
//! A [`BufferPool`] hands out aligned byte ranges from one backing block and
//! rewinds to the beginning on [`reset`](BufferPool::reset). It is meant for
//! per-draw constant data that only lives for one frame.
//!
//! # Modes
//!
//! - [`BufferPoolMode::ShadowMemory`]: the block is plain CPU memory owned by the
//!   pool. Data that must be bound several times gets a small dedicated buffer.
//! - [`BufferPoolMode::GpuOffset`]: the block is a mappable GPU buffer checked
//!   out from the [`ResourceAllocator`] every reset cycle. Allocations are
//!   `(shared buffer, offset)` pairs.
//!
//! # Example
//!
//! ```ignore
//! let mut pool = BufferPool::for_device(allocator, &device, 64 * 1024)?;
//!
//! // Each draw
//! let size = std::mem::size_of::<DrawUniforms>() as u64;
//! if pool.can_allocate(size) {
//!     let alloc = pool.allocate(size, BufferPoolAllocationType::UsedOnce)?;
//!     pool.write(&alloc, bytes_of(&uniforms))?;
//!     // Bind alloc.buffer() at alloc.buffer_offset()
//! }
//!
//! // Once the frame is submitted
//! pool.reset()?;
//! ```

use std::sync::Arc;

use crate::allocator::ResourceAllocator;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, BufferUsage};

/// Where a [`BufferPool`] keeps its backing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferPoolMode {
    /// CPU block owned by the pool.
    #[default]
    ShadowMemory,
    /// GPU buffer borrowed from the resource allocator, bound at an offset.
    GpuOffset,
}

/// How an allocation will be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferPoolAllocationType {
    /// Written and bound once. The caller uploads it through its own path.
    #[default]
    UsedOnce,
    /// Bound several times without re-uploading.
    UsedMultipleTimes,
}

/// A sub-allocation handed out by a [`BufferPool`].
///
/// Slots are owned by the caller and can be passed back to
/// [`BufferPool::allocate_into`] every frame, so a dedicated buffer created for
/// a [`UsedMultipleTimes`](BufferPoolAllocationType::UsedMultipleTimes)
/// allocation is reused while the requested size stays the same.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolAllocation {
    buffer: Option<Arc<Buffer>>,
    offset: u64,
    size: u64,
    kind: BufferPoolAllocationType,
    gpu_resident: bool,
}

impl BufferPoolAllocation {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset into the pool's block.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the allocation in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the end offset (offset + size).
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Get the allocation type.
    pub fn kind(&self) -> BufferPoolAllocationType {
        self.kind
    }

    /// The buffer to bind: the shared backing buffer in GPU-offset mode, the
    /// dedicated buffer for multi-use shadow allocations, `None` otherwise.
    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer.as_ref()
    }

    /// Offset to bind [`buffer`](Self::buffer) at.
    pub fn buffer_offset(&self) -> u64 {
        if self.gpu_resident { self.offset } else { 0 }
    }

    /// Returns true if the data already lives in GPU memory.
    pub fn is_gpu_resident(&self) -> bool {
        self.gpu_resident
    }

    fn dedicated_buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer.as_ref().filter(|_| !self.gpu_resident)
    }
}

/// Backing block of a pool.
enum Backing {
    Shadow(Vec<u8>),
    Gpu(Arc<Buffer>),
}

/// A linear sub-allocator for per-frame upload data.
///
/// # Alignment
///
/// After every allocation the cursor is rounded up to the pool alignment,
/// typically the device's minimum uniform buffer offset alignment. The pool
/// size must be a multiple of the alignment.
///
/// # Thread Safety
///
/// `BufferPool` is NOT thread-safe. Each recording context owns its own pool;
/// every mutating method takes `&mut self`.
pub struct BufferPool {
    allocator: Arc<ResourceAllocator>,
    mode: BufferPoolMode,
    size: u64,
    alignment: u64,
    cursor: u64,
    // `None` only after dispose.
    backing: Option<Backing>,
    mapped: bool,
}

impl BufferPool {
    /// Create a new buffer pool.
    ///
    /// In GPU-offset mode the first backing buffer is checked out immediately.
    ///
    /// # Errors
    ///
    /// Fails if `size` or `alignment` is zero, if `size` is not a multiple of
    /// `alignment`, or if the backing buffer cannot be created.
    pub fn new(
        allocator: Arc<ResourceAllocator>,
        mode: BufferPoolMode,
        alignment: u64,
        size: u64,
    ) -> GraphicsResult<Self> {
        if alignment == 0 || size == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer pool size ({size}) and alignment ({alignment}) must be non-zero"
            )));
        }

        if size % alignment != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer pool size {size} is not a multiple of alignment {alignment}"
            )));
        }

        let backing = match mode {
            BufferPoolMode::ShadowMemory => Backing::Shadow(vec![0u8; size as usize]),
            BufferPoolMode::GpuOffset => {
                Backing::Gpu(allocator.get_temporary_buffer(&Self::backing_descriptor(size))?)
            }
        };

        log::debug!("BufferPool: created {mode:?} pool, size={size} alignment={alignment}");

        Ok(Self {
            allocator,
            mode,
            size,
            alignment,
            cursor: 0,
            backing: Some(backing),
            mapped: false,
        })
    }

    /// Create a pool whose alignment and mode follow the device capabilities.
    pub fn for_device(
        allocator: Arc<ResourceAllocator>,
        device: &GraphicsDevice,
        size: u64,
    ) -> GraphicsResult<Self> {
        let capabilities = device.capabilities();
        let mode = if capabilities.uniform_buffer_offsets {
            BufferPoolMode::GpuOffset
        } else {
            BufferPoolMode::ShadowMemory
        };
        Self::new(
            allocator,
            mode,
            capabilities.min_uniform_buffer_offset_alignment,
            size,
        )
    }

    fn backing_descriptor(size: u64) -> BufferDescriptor {
        BufferDescriptor::new(size, BufferUsage::UNIFORM | BufferUsage::MAP_WRITE)
    }

    /// Get the total size of the pool in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the allocation alignment.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Get the current cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Get the amount of space remaining.
    pub fn remaining(&self) -> u64 {
        self.size - self.cursor
    }

    /// Get the backing mode.
    pub fn mode(&self) -> BufferPoolMode {
        self.mode
    }

    /// Returns true while the GPU backing buffer is mapped.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// The GPU backing buffer of the current reset cycle.
    pub fn backing_buffer(&self) -> Option<&Arc<Buffer>> {
        match &self.backing {
            Some(Backing::Gpu(buffer)) => Some(buffer),
            _ => None,
        }
    }

    /// The CPU block in shadow-memory mode.
    pub fn shadow_memory(&self) -> Option<&[u8]> {
        match &self.backing {
            Some(Backing::Shadow(memory)) => Some(memory),
            _ => None,
        }
    }

    /// Map the backing buffer. Does nothing in shadow-memory mode or when mapped.
    pub fn map(&mut self) -> GraphicsResult<()> {
        if self.mapped {
            return Ok(());
        }
        if let Some(Backing::Gpu(buffer)) = &self.backing {
            buffer.map()?;
            self.mapped = true;
        }
        Ok(())
    }

    /// Unmap the backing buffer. Does nothing in shadow-memory mode or when unmapped.
    pub fn unmap(&mut self) {
        if !self.mapped {
            return;
        }
        if let Some(Backing::Gpu(buffer)) = &self.backing {
            buffer.unmap();
        }
        self.mapped = false;
    }

    /// Rewind the cursor to the beginning of the pool.
    ///
    /// In GPU-offset mode a fresh backing buffer is checked out from the
    /// allocator and the previous one is unmapped and released.
    ///
    /// # Warning
    ///
    /// Make sure the GPU has finished reading shadow-memory allocations before
    /// calling this, or data still in use may be overwritten.
    pub fn reset(&mut self) -> GraphicsResult<()> {
        crate::profile_scope!("buffer_pool_reset");

        if let Some(Backing::Gpu(current)) = &mut self.backing {
            // Check out first so the new buffer is never the one being released.
            let next = self
                .allocator
                .get_temporary_buffer(&Self::backing_descriptor(self.size))?;
            current.unmap();
            let previous = std::mem::replace(current, next);
            self.mapped = false;
            self.allocator.release_reference(&previous)?;
        }

        log::debug!("BufferPool: reset after using {} of {} bytes", self.cursor, self.size);
        self.cursor = 0;
        Ok(())
    }

    /// Check if an allocation of `size` bytes fits.
    pub fn can_allocate(&self, size: u64) -> bool {
        self.cursor
            .checked_add(size)
            .is_some_and(|end| end <= self.size)
    }

    /// Allocate `size` bytes into a fresh slot.
    ///
    /// See [`allocate_into`](Self::allocate_into).
    pub fn allocate(
        &mut self,
        size: u64,
        kind: BufferPoolAllocationType,
    ) -> GraphicsResult<BufferPoolAllocation> {
        let mut slot = BufferPoolAllocation::new();
        self.allocate_into(&mut slot, size, kind)?;
        Ok(slot)
    }

    /// Allocate `size` bytes into `slot`.
    ///
    /// Callers are expected to check [`can_allocate`](Self::can_allocate) first.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::PoolExhausted`] if the aligned cursor would pass
    /// the end of the pool. The pool and the slot are unchanged on failure.
    pub fn allocate_into(
        &mut self,
        slot: &mut BufferPoolAllocation,
        size: u64,
        kind: BufferPoolAllocationType,
    ) -> GraphicsResult<()> {
        crate::profile_scope!("buffer_pool_allocate");

        let start = self.cursor;
        let next_cursor = start
            .checked_add(size)
            .and_then(|end| align_up(end, self.alignment))
            .filter(|&end| end <= self.size);
        let Some(next_cursor) = next_cursor else {
            log::warn!(
                "BufferPool: allocation of {size} bytes at cursor {start} exceeds pool size {}",
                self.size
            );
            return Err(GraphicsError::PoolExhausted {
                requested: size,
                cursor: start,
                size: self.size,
            });
        };

        match self.mode {
            BufferPoolMode::GpuOffset => {
                self.map()?;
                self.release_dedicated(slot)?;
                slot.buffer = self.backing_buffer().cloned();
                slot.gpu_resident = true;
            }
            BufferPoolMode::ShadowMemory => match kind {
                BufferPoolAllocationType::UsedOnce => {
                    self.release_dedicated(slot)?;
                    slot.buffer = None;
                    slot.gpu_resident = false;
                }
                BufferPoolAllocationType::UsedMultipleTimes => {
                    let reusable = slot.dedicated_buffer().is_some_and(|b| b.size() == size);
                    if !reusable {
                        let buffer = self
                            .allocator
                            .factory()
                            .create_buffer(&BufferDescriptor::uniform(size))?;
                        if let Err(err) = self.release_dedicated(slot) {
                            if let Err(cleanup) = self.allocator.factory().destroy_buffer(buffer) {
                                log::error!("BufferPool: failed to destroy unused buffer: {cleanup}");
                            }
                            return Err(err);
                        }
                        slot.buffer = Some(buffer);
                        slot.gpu_resident = false;
                    }
                }
            },
        }

        slot.offset = start;
        slot.size = size;
        slot.kind = kind;
        self.cursor = next_cursor;
        Ok(())
    }

    /// Copy `data` into the range of `allocation`.
    ///
    /// In GPU-offset mode the bytes go through the mapped backing buffer. In
    /// shadow-memory mode they go into the CPU block and, when the allocation
    /// has a dedicated buffer, into that buffer as well.
    ///
    /// # Errors
    ///
    /// Fails if `data` is larger than the allocation, or with
    /// [`GraphicsError::BufferNotMapped`] if the backing buffer was unmapped.
    pub fn write(&mut self, allocation: &BufferPoolAllocation, data: &[u8]) -> GraphicsResult<()> {
        let len = data.len() as u64;
        if len > allocation.size || allocation.end() > self.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "{len} bytes do not fit allocation of {} bytes at offset {}",
                allocation.size, allocation.offset
            )));
        }

        match &mut self.backing {
            Some(Backing::Gpu(buffer)) => {
                if !self.mapped {
                    return Err(GraphicsError::BufferNotMapped);
                }
                buffer.write(allocation.offset, data)
            }
            Some(Backing::Shadow(memory)) => {
                let start = allocation.offset as usize;
                memory[start..start + data.len()].copy_from_slice(data);
                match allocation.dedicated_buffer() {
                    Some(dedicated) => dedicated.upload(0, data),
                    None => Ok(()),
                }
            }
            None => Err(GraphicsError::Internal("buffer pool was disposed".to_string())),
        }
    }

    /// Destroy the dedicated buffer held by `slot`, if any, and clear the slot.
    pub fn release_slot(&self, slot: &mut BufferPoolAllocation) -> GraphicsResult<()> {
        self.release_dedicated(slot)?;
        *slot = BufferPoolAllocation::default();
        Ok(())
    }

    fn release_dedicated(&self, slot: &mut BufferPoolAllocation) -> GraphicsResult<()> {
        if slot.gpu_resident {
            return Ok(());
        }
        match slot.buffer.take() {
            Some(buffer) => self.allocator.factory().destroy_buffer(buffer),
            None => Ok(()),
        }
    }

    /// Release the backing block and consume the pool.
    pub fn dispose(mut self) -> GraphicsResult<()> {
        self.release_backing()
    }

    fn release_backing(&mut self) -> GraphicsResult<()> {
        self.mapped = false;
        match self.backing.take() {
            Some(Backing::Gpu(buffer)) => {
                buffer.unmap();
                self.allocator.release_reference(&buffer)
            }
            Some(Backing::Shadow(_)) | None => Ok(()),
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if let Err(err) = self.release_backing() {
            log::error!("BufferPool: failed to release backing buffer: {err}");
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("mode", &self.mode)
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("cursor", &self.cursor)
            .field("mapped", &self.mapped)
            .field("backing", &self.backing_buffer().map(|b| b.name()))
            .finish()
    }
}

/// Round `value` up to the next multiple of `alignment`, or `None` on overflow.
#[inline]
fn align_up(value: u64, alignment: u64) -> Option<u64> {
    value.div_ceil(alignment).checked_mul(alignment)
}
