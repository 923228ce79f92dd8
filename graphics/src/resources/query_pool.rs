//! GPU query pool resource.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::device::GraphicsDevice;
use crate::types::{QueryPoolDescriptor, QueryType};

/// A pool of GPU queries of a single type.
///
/// Query pools are created by [`GraphicsDevice::create_query_pool`] and are
/// reference-counted.
pub struct QueryPool {
    device: Weak<GraphicsDevice>,
    descriptor: QueryPoolDescriptor,
    name: RwLock<String>,
    destroyed: AtomicBool,
}

impl QueryPool {
    /// Create a query pool that is not owned by a [`GraphicsDevice`].
    pub fn new(descriptor: QueryPoolDescriptor) -> Self {
        Self::with_device(Weak::new(), descriptor)
    }

    pub(crate) fn with_device(
        device: Weak<GraphicsDevice>,
        descriptor: QueryPoolDescriptor,
    ) -> Self {
        Self {
            device,
            descriptor,
            name: RwLock::new(String::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    /// Get the query pool descriptor.
    pub fn descriptor(&self) -> &QueryPoolDescriptor {
        &self.descriptor
    }

    /// Type of the pooled queries.
    pub fn query_type(&self) -> QueryType {
        self.descriptor.query_type
    }

    /// Number of queries in the pool.
    pub fn query_count(&self) -> u32 {
        self.descriptor.count
    }

    /// Get the debug name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Set the debug name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Returns true once the owning factory destroyed this pool.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for QueryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPool")
            .field("name", &*self.name.read())
            .field("query_type", &self.descriptor.query_type)
            .field("count", &self.descriptor.count)
            .finish()
    }
}

static_assertions::assert_impl_all!(QueryPool: Send, Sync);
