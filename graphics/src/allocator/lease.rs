//! Scoped leases on cached resources.

use std::ops::Deref;
use std::sync::Arc;

use super::{CachedResource, ResourceAllocator};
use crate::error::GraphicsResult;

/// A checked-out resource that releases its reference when dropped.
///
/// Returned by [`ResourceAllocator::checkout`] and friends. Use [`share`] to take
/// an additional reference on the same physical resource.
///
/// [`share`]: Self::share
///
/// # Example
///
/// ```ignore
/// {
///     let target = allocator.checkout_texture(&descriptor)?;
///     render_into(&target);
/// } // released here
/// ```
pub struct TemporaryResource<'a, R: CachedResource> {
    allocator: &'a ResourceAllocator,
    // `None` only once released or detached.
    resource: Option<Arc<R>>,
}

impl<'a, R: CachedResource> TemporaryResource<'a, R> {
    pub(crate) fn new(allocator: &'a ResourceAllocator, resource: Arc<R>) -> Self {
        Self {
            allocator,
            resource: Some(resource),
        }
    }

    /// The leased resource.
    pub fn resource(&self) -> &Arc<R> {
        match &self.resource {
            Some(resource) => resource,
            None => unreachable!("lease accessed after release"),
        }
    }

    /// Add a reference and return a second lease on the same resource.
    pub fn share(&self) -> GraphicsResult<Self> {
        self.allocator.add_reference(self.resource())?;
        Ok(Self::new(self.allocator, Arc::clone(self.resource())))
    }

    /// Release the reference now, reporting any failure.
    pub fn release(self) -> GraphicsResult<()> {
        let allocator = self.allocator;
        let resource = self.into_inner();
        allocator.release_reference(&resource)
    }

    /// Detach the resource from the lease. The caller becomes responsible for
    /// calling [`ResourceAllocator::release_reference`].
    pub fn into_inner(mut self) -> Arc<R> {
        match self.resource.take() {
            Some(resource) => resource,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<R: CachedResource> Deref for TemporaryResource<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.resource()
    }
}

impl<R: CachedResource> Drop for TemporaryResource<'_, R> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        if let Err(err) = self.allocator.release_reference(&resource) {
            log::error!("TemporaryResource: failed to release {}: {err}", R::KIND);
        }
    }
}

impl<R: CachedResource> std::fmt::Debug for TemporaryResource<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TemporaryResource").field(self.resource()).finish()
    }
}
