//! Description-keyed resource buckets with reference counting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::{CachedResource, RecyclePolicy, ResourceFactory, ResourceKind};
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{Buffer, QueryPool, Texture};

/// Snapshot of a [`ResourceLink`] handed to recycle policies and the
/// free-notification hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLinkInfo {
    /// Kind of the linked resource.
    pub kind: ResourceKind,
    /// Number of outstanding checkouts.
    pub reference_count: u32,
    /// Number of times the resource was checked out or had its count updated.
    pub access_total_count: u64,
    /// Same as `access_total_count`, but reset on every recycle pass.
    pub access_count_since_recycle: u64,
    /// Last time the reference count was touched.
    pub last_access_time: Instant,
}

/// Bookkeeping for one live cached resource.
pub(crate) struct ResourceLink<R> {
    resource: Arc<R>,
    reference_count: u32,
    access_total_count: u64,
    access_count_since_recycle: u64,
    last_access_time: Instant,
}

impl<R: CachedResource> ResourceLink<R> {
    /// A freshly created resource starts checked out once.
    fn new(resource: Arc<R>) -> Self {
        Self {
            resource,
            reference_count: 1,
            access_total_count: 1,
            access_count_since_recycle: 1,
            last_access_time: Instant::now(),
        }
    }

    fn info(&self) -> ResourceLinkInfo {
        ResourceLinkInfo {
            kind: R::KIND,
            reference_count: self.reference_count,
            access_total_count: self.access_total_count,
            access_count_since_recycle: self.access_count_since_recycle,
            last_access_time: self.last_access_time,
        }
    }

    fn update_counter(&mut self, delta: i32) -> GraphicsResult<()> {
        let updated = i64::from(self.reference_count) + i64::from(delta);
        let Ok(updated) = u32::try_from(updated) else {
            log::warn!(
                "ResourceAllocator: rejected reference update on {} '{}' (count {}, delta {})",
                R::KIND,
                self.resource_name(),
                self.reference_count,
                delta
            );
            return Err(GraphicsError::ReferenceCountUnderflow {
                current: self.reference_count,
                delta,
            });
        };

        self.reference_count = updated;
        self.access_total_count += 1;
        self.access_count_since_recycle += 1;
        self.last_access_time = Instant::now();
        Ok(())
    }

    fn resource_name(&self) -> String {
        R::as_resource_ref(&self.resource).name()
    }
}

/// Occupancy of one kind-specific cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of description buckets, including empty ones.
    pub buckets: usize,
    /// Number of cached resources.
    pub resident: usize,
    /// Number of cached resources with at least one outstanding reference.
    pub referenced: usize,
}

/// Cache of one resource kind: description -> insertion-ordered links.
pub struct ResourceCache<R: CachedResource> {
    buckets: HashMap<R::Descriptor, Vec<ResourceLink<R>>>,
}

impl<R: CachedResource> ResourceCache<R> {
    pub(crate) fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    /// Check out an unreferenced resource matching `descriptor`, or create one.
    ///
    /// Returns the resource and whether it was newly created.
    pub(crate) fn checkout(
        &mut self,
        descriptor: &R::Descriptor,
        factory: &dyn ResourceFactory,
        allocator_name: Option<&str>,
    ) -> GraphicsResult<(Arc<R>, bool)> {
        let links = self.buckets.entry(descriptor.clone()).or_default();

        // First fit in insertion order.
        if let Some(link) = links.iter_mut().find(|link| link.reference_count == 0) {
            link.update_counter(1)?;
            return Ok((Arc::clone(&link.resource), false));
        }

        let index = links.len();
        let resource = R::create(factory, descriptor)?;
        let name = match allocator_name {
            Some(allocator) => format!("{allocator}-{}-{index}", R::KIND.type_name()),
            None => format!("{}-{index}", R::KIND.type_name()),
        };
        resource.set_debug_name(name);

        let actual = resource.actual_descriptor();
        if actual != *descriptor {
            log::debug!(
                "ResourceAllocator: {} created as {actual:?} instead of {descriptor:?}",
                R::KIND
            );
        }

        self.buckets
            .entry(actual)
            .or_default()
            .push(ResourceLink::new(Arc::clone(&resource)));

        Ok((resource, true))
    }

    /// Apply `delta` to the reference count of `resource`.
    ///
    /// Notifies the factory when the count reaches zero.
    pub(crate) fn update_reference(
        &mut self,
        resource: &Arc<R>,
        delta: i32,
        factory: &dyn ResourceFactory,
    ) -> GraphicsResult<()> {
        let link = self
            .find_link_mut(resource)
            .ok_or(GraphicsError::ResourceNotOwned { kind: R::KIND })?;

        link.update_counter(delta)?;

        if link.reference_count == 0 {
            factory.resource_unreferenced(R::as_resource_ref(&link.resource), &link.info());
        }
        Ok(())
    }

    /// Current reference count of `resource`, if it is tracked here.
    pub(crate) fn reference_count(&self, resource: &Arc<R>) -> Option<u32> {
        self.buckets
            .get(&resource.actual_descriptor())?
            .iter()
            .find(|link| Arc::ptr_eq(&link.resource, resource))
            .map(|link| link.reference_count)
    }

    /// Number of links in the bucket for `descriptor`, if the bucket exists.
    pub(crate) fn bucket_len(&self, descriptor: &R::Descriptor) -> Option<usize> {
        self.buckets.get(descriptor).map(Vec::len)
    }

    /// Evict unreferenced resources the policy selects.
    ///
    /// Every unreferenced link has its since-recycle access count reset,
    /// whether it is evicted or not. Buckets left empty are dropped.
    pub(crate) fn recycle(
        &mut self,
        policy: &RecyclePolicy,
        factory: &dyn ResourceFactory,
    ) -> GraphicsResult<usize> {
        let mut evicted = 0;

        for links in self.buckets.values_mut() {
            for index in (0..links.len()).rev() {
                let link = &mut links[index];
                if link.reference_count != 0 {
                    continue;
                }

                let evict = policy.should_recycle(&link.info());
                link.access_count_since_recycle = 0;

                if evict {
                    let link = links.remove(index);
                    R::destroy(factory, link.resource)?;
                    evicted += 1;
                }
            }
        }

        self.buckets.retain(|_, links| !links.is_empty());
        Ok(evicted)
    }

    /// Destroy every resource regardless of its reference count.
    ///
    /// All links are dropped even when a destroy fails; the first failure is returned.
    pub(crate) fn teardown(&mut self, factory: &dyn ResourceFactory) -> GraphicsResult<usize> {
        let mut destroyed = 0;
        let mut first_error = None;

        for link in std::mem::take(&mut self.buckets).into_values().flatten() {
            if link.reference_count > 0 {
                log::debug!(
                    "ResourceAllocator: tearing down {} '{}' with {} outstanding reference(s)",
                    R::KIND,
                    link.resource_name(),
                    link.reference_count
                );
            }
            match R::destroy(factory, link.resource) {
                Ok(()) => destroyed += 1,
                Err(err) => {
                    log::warn!("ResourceAllocator: failed to destroy {}: {err}", R::KIND);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(destroyed),
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            buckets: self.buckets.len(),
            ..CacheStats::default()
        };
        for link in self.buckets.values().flatten() {
            stats.resident += 1;
            if link.reference_count > 0 {
                stats.referenced += 1;
            }
        }
        stats
    }

    fn find_link_mut(&mut self, resource: &Arc<R>) -> Option<&mut ResourceLink<R>> {
        self.buckets
            .get_mut(&resource.actual_descriptor())?
            .iter_mut()
            .find(|link| Arc::ptr_eq(&link.resource, resource))
    }
}

/// The three kind-specific caches guarded by the allocator lock.
pub struct ResourceCaches {
    pub(crate) textures: ResourceCache<Texture>,
    pub(crate) buffers: ResourceCache<Buffer>,
    pub(crate) query_pools: ResourceCache<QueryPool>,
}

impl ResourceCaches {
    pub(crate) fn new() -> Self {
        Self {
            textures: ResourceCache::new(),
            buffers: ResourceCache::new(),
            query_pools: ResourceCache::new(),
        }
    }

    pub(crate) fn recycle_kind(
        &mut self,
        kind: ResourceKind,
        policy: &RecyclePolicy,
        factory: &dyn ResourceFactory,
    ) -> GraphicsResult<usize> {
        match kind {
            ResourceKind::Texture => self.textures.recycle(policy, factory),
            ResourceKind::Buffer => self.buffers.recycle(policy, factory),
            ResourceKind::QueryPool => self.query_pools.recycle(policy, factory),
        }
    }

    pub(crate) fn teardown_kind(
        &mut self,
        kind: ResourceKind,
        factory: &dyn ResourceFactory,
    ) -> GraphicsResult<usize> {
        match kind {
            ResourceKind::Texture => self.textures.teardown(factory),
            ResourceKind::Buffer => self.buffers.teardown(factory),
            ResourceKind::QueryPool => self.query_pools.teardown(factory),
        }
    }
}
