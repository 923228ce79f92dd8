//! Temporary resource allocator.
//!
//! [`ResourceAllocator`] caches textures, buffers and query pools by descriptor,
//! tracks how many users hold each one, and recycles unreferenced resources
//! according to a [`RecyclePolicy`].
//!
//! # Checkout and release
//!
//! [`get`](ResourceAllocator::get) returns the first unreferenced resource
//! created with an equal descriptor, in insertion order, or asks the
//! [`ResourceFactory`] for a new one. Every checkout must be matched by one
//! [`release_reference`](ResourceAllocator::release_reference). Extra users call
//! [`add_reference`](ResourceAllocator::add_reference) and release once more.
//! The `checkout*` methods wrap this pairing in a [`TemporaryResource`] lease.
//!
//! ```ignore
//! let allocator = ResourceAllocator::new(device).with_name("frame");
//!
//! let hdr = allocator.get_temporary_texture(&hdr_descriptor)?;
//! // ... render ...
//! allocator.release_reference(&hdr)?;
//!
//! // At the end of the frame, destroy what nobody used.
//! allocator.recycle()?;
//! ```
//!
//! # Thread Safety
//!
//! All operations take one allocator-wide lock, so calls from different
//! recording threads are totally ordered.

mod cache;
mod factory;
mod lease;
mod policy;
mod resource;

pub use cache::{CacheStats, ResourceLinkInfo};
pub use factory::ResourceFactory;
pub use lease::TemporaryResource;
pub use policy::RecyclePolicy;
pub use resource::{CachedResource, ResourceKind, ResourceRef};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::GraphicsDevice;
use crate::error::GraphicsResult;
use crate::resources::{Buffer, QueryPool, Texture};
use crate::types::{BufferDescriptor, QueryPoolDescriptor, QueryType, TextureDescriptor};
use cache::ResourceCaches;

/// Allocator-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorStats {
    /// Texture cache occupancy.
    pub textures: CacheStats,
    /// Buffer cache occupancy.
    pub buffers: CacheStats,
    /// Query pool cache occupancy.
    pub query_pools: CacheStats,
    /// Resources created by the factory since the allocator was created.
    pub created: u64,
    /// Successful checkouts, hits and misses.
    pub checkouts: u64,
    /// Successful reference releases.
    pub releases: u64,
    /// Resources destroyed by recycle passes.
    pub evicted: u64,
}

impl AllocatorStats {
    /// Total number of cached resources across all kinds.
    pub fn resident(&self) -> usize {
        self.textures.resident + self.buffers.resident + self.query_pools.resident
    }

    /// Total number of referenced resources across all kinds.
    pub fn referenced(&self) -> usize {
        self.textures.referenced + self.buffers.referenced + self.query_pools.referenced
    }
}

#[derive(Default)]
struct Counters {
    created: u64,
    checkouts: u64,
    releases: u64,
    evicted: u64,
}

struct AllocatorState {
    caches: ResourceCaches,
    counters: Counters,
    recycle_policy: Option<RecyclePolicy>,
}

/// A graphics resource allocator tracking usage references and recycling
/// unused resources based on a recycle policy.
pub struct ResourceAllocator {
    name: Option<String>,
    factory: Arc<dyn ResourceFactory>,
    state: Mutex<AllocatorState>,
}

impl ResourceAllocator {
    /// Create an allocator that creates its resources on `device`.
    pub fn new(device: Arc<GraphicsDevice>) -> Self {
        Self::with_factory(device)
    }

    /// Create an allocator backed by a custom resource factory.
    pub fn with_factory(factory: Arc<dyn ResourceFactory>) -> Self {
        Self {
            name: None,
            factory,
            state: Mutex::new(AllocatorState {
                caches: ResourceCaches::new(),
                counters: Counters::default(),
                recycle_policy: Some(RecyclePolicy::default()),
            }),
        }
    }

    /// Set the allocator name used as a prefix for resource debug names.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// Get the allocator name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the resource factory.
    pub fn factory(&self) -> &Arc<dyn ResourceFactory> {
        &self.factory
    }

    /// Get the default recycle policy used by [`recycle`](Self::recycle).
    pub fn recycle_policy(&self) -> Option<RecyclePolicy> {
        self.state.lock().recycle_policy.clone()
    }

    /// Set the default recycle policy. `None` turns [`recycle`](Self::recycle) into a no-op.
    pub fn set_recycle_policy(&self, policy: Option<RecyclePolicy>) {
        self.state.lock().recycle_policy = policy;
    }

    /// Check out a resource matching `descriptor`, creating it if needed.
    ///
    /// The returned resource has one reference that must be released with
    /// [`release_reference`](Self::release_reference).
    ///
    /// # Errors
    ///
    /// Propagates factory failures. Nothing is cached in that case.
    pub fn get<R: CachedResource>(&self, descriptor: &R::Descriptor) -> GraphicsResult<Arc<R>> {
        crate::profile_scope!("resource_allocator_get");

        let mut state = self.state.lock();
        let (resource, created) =
            R::cache_mut(&mut state.caches).checkout(descriptor, &*self.factory, self.name())?;

        state.counters.checkouts += 1;
        if created {
            state.counters.created += 1;
            log::trace!("ResourceAllocator: created {} for {descriptor:?}", R::KIND);
        } else {
            log::trace!("ResourceAllocator: reused {} for {descriptor:?}", R::KIND);
        }
        Ok(resource)
    }

    /// Get a temporary texture.
    pub fn get_temporary_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> GraphicsResult<Arc<Texture>> {
        self.get::<Texture>(descriptor)
    }

    /// Get a temporary buffer.
    pub fn get_temporary_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<Arc<Buffer>> {
        self.get::<Buffer>(descriptor)
    }

    /// Get a query pool for `count` queries of `query_type`.
    pub fn get_query_pool(&self, query_type: QueryType, count: u32) -> GraphicsResult<Arc<QueryPool>> {
        self.get::<QueryPool>(&QueryPoolDescriptor::new(query_type, count))
    }

    /// Check out a resource as a lease released on drop.
    pub fn checkout<R: CachedResource>(
        &self,
        descriptor: &R::Descriptor,
    ) -> GraphicsResult<TemporaryResource<'_, R>> {
        let resource = self.get::<R>(descriptor)?;
        Ok(TemporaryResource::new(self, resource))
    }

    /// Check out a texture as a lease released on drop.
    pub fn checkout_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> GraphicsResult<TemporaryResource<'_, Texture>> {
        self.checkout::<Texture>(descriptor)
    }

    /// Check out a buffer as a lease released on drop.
    pub fn checkout_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> GraphicsResult<TemporaryResource<'_, Buffer>> {
        self.checkout::<Buffer>(descriptor)
    }

    /// Check out a query pool as a lease released on drop.
    pub fn checkout_query_pool(
        &self,
        query_type: QueryType,
        count: u32,
    ) -> GraphicsResult<TemporaryResource<'_, QueryPool>> {
        self.checkout::<QueryPool>(&QueryPoolDescriptor::new(query_type, count))
    }

    /// Add a reference to a resource tracked by this allocator.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ResourceNotOwned`](crate::GraphicsError::ResourceNotOwned)
    /// if the resource was not allocated by this allocator.
    pub fn add_reference<R: CachedResource>(&self, resource: &Arc<R>) -> GraphicsResult<()> {
        let mut state = self.state.lock();
        R::cache_mut(&mut state.caches).update_reference(resource, 1, &*self.factory)?;
        log::trace!("ResourceAllocator: added reference to {} '{}'", R::KIND, resource_name(resource));
        Ok(())
    }

    /// Remove a reference from a resource tracked by this allocator.
    ///
    /// When the count reaches zero the factory is notified and the resource
    /// becomes available to the next matching checkout.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ReferenceCountUnderflow`](crate::GraphicsError::ReferenceCountUnderflow)
    /// on a release without a matching checkout, and
    /// [`GraphicsError::ResourceNotOwned`](crate::GraphicsError::ResourceNotOwned)
    /// if the resource was not allocated by this allocator.
    pub fn release_reference<R: CachedResource>(&self, resource: &Arc<R>) -> GraphicsResult<()> {
        let mut state = self.state.lock();
        R::cache_mut(&mut state.caches).update_reference(resource, -1, &*self.factory)?;
        state.counters.releases += 1;
        log::trace!("ResourceAllocator: released {} '{}'", R::KIND, resource_name(resource));
        Ok(())
    }

    /// Current reference count of `resource`, or `None` if it is not tracked.
    pub fn reference_count<R: CachedResource>(&self, resource: &Arc<R>) -> Option<u32> {
        R::cache(&self.state.lock().caches).reference_count(resource)
    }

    /// Number of cached resources filed under `descriptor`, or `None` if there
    /// is no bucket for it.
    pub fn bucket_len<R: CachedResource>(&self, descriptor: &R::Descriptor) -> Option<usize> {
        R::cache(&self.state.lock().caches).bucket_len(descriptor)
    }

    /// Recycle unreferenced resources with the default policy.
    ///
    /// Does nothing if no default policy is set. Returns the number of
    /// destroyed resources.
    pub fn recycle(&self) -> GraphicsResult<usize> {
        match self.recycle_policy() {
            Some(policy) => self.recycle_with(&policy),
            None => Ok(0),
        }
    }

    /// Recycle unreferenced resources of every kind with `policy`.
    ///
    /// # Errors
    ///
    /// A failure to destroy a resource stops the sweep and is returned as is.
    pub fn recycle_with(&self, policy: &RecyclePolicy) -> GraphicsResult<usize> {
        crate::profile_scope!("resource_allocator_recycle");

        let mut state = self.state.lock();
        let mut evicted = 0;
        for kind in ResourceKind::ALL {
            let result = state.caches.recycle_kind(kind, policy, &*self.factory);
            // Count partial progress before surfacing an error.
            match result {
                Ok(count) => evicted += count,
                Err(err) => {
                    state.counters.evicted += evicted as u64;
                    return Err(err);
                }
            }
        }
        state.counters.evicted += evicted as u64;

        log::debug!("ResourceAllocator: recycled {evicted} resource(s) with {policy:?}");
        Ok(evicted)
    }

    /// Recycle unreferenced resources of a single kind with `policy`.
    pub fn recycle_kind(&self, kind: ResourceKind, policy: &RecyclePolicy) -> GraphicsResult<usize> {
        let mut state = self.state.lock();
        let evicted = state.caches.recycle_kind(kind, policy, &*self.factory)?;
        state.counters.evicted += evicted as u64;

        log::debug!("ResourceAllocator: recycled {evicted} {kind} resource(s) with {policy:?}");
        Ok(evicted)
    }

    /// Destroy every cached resource, referenced or not, and clear all caches.
    ///
    /// Only meant for shutdown. Outstanding leases keep their `Arc` alive but the
    /// underlying resources are destroyed.
    ///
    /// # Errors
    ///
    /// Every kind is cleared even if a destroy fails; the first failure is returned.
    pub fn teardown(&self) -> GraphicsResult<usize> {
        let mut state = self.state.lock();
        let mut destroyed = 0;
        let mut first_error = None;
        for kind in ResourceKind::ALL {
            match state.caches.teardown_kind(kind, &*self.factory) {
                Ok(count) => destroyed += count,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        log::debug!("ResourceAllocator: tore down {destroyed} resource(s)");
        match first_error {
            Some(err) => Err(err),
            None => Ok(destroyed),
        }
    }

    /// Snapshot of cache occupancy and lifetime counters.
    pub fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        AllocatorStats {
            textures: state.caches.textures.stats(),
            buffers: state.caches.buffers.stats(),
            query_pools: state.caches.query_pools.stats(),
            created: state.counters.created,
            checkouts: state.counters.checkouts,
            releases: state.counters.releases,
            evicted: state.counters.evicted,
        }
    }
}

fn resource_name<R: CachedResource>(resource: &Arc<R>) -> String {
    R::as_resource_ref(resource).name()
}

impl Drop for ResourceAllocator {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            log::error!("ResourceAllocator: teardown failed: {err}");
        }
    }
}

impl std::fmt::Debug for ResourceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAllocator")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

// Ensure ResourceAllocator is Send + Sync
static_assertions::assert_impl_all!(ResourceAllocator: Send, Sync);
