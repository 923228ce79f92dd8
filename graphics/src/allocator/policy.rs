//! Recycle policies deciding which unreferenced resources get destroyed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::ResourceLinkInfo;

/// Decides whether an unreferenced cached resource should be destroyed.
///
/// Policies are only ever evaluated for links with a reference count of zero.
///
/// # Example
///
/// ```ignore
/// // Keep anything touched during the last two seconds.
/// allocator.recycle_with(&RecyclePolicy::unused_for(Duration::from_secs(2)))?;
///
/// // Custom rule on the access statistics.
/// let policy = RecyclePolicy::new(|link| link.access_total_count < 4);
/// ```
#[derive(Clone)]
pub struct RecyclePolicy {
    predicate: Arc<dyn Fn(&ResourceLinkInfo) -> bool + Send + Sync>,
    name: &'static str,
}

impl RecyclePolicy {
    /// Create a policy from a predicate returning `true` for resources to evict.
    pub fn new(predicate: impl Fn(&ResourceLinkInfo) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            name: "custom",
        }
    }

    /// Evict every unreferenced resource.
    pub fn always() -> Self {
        Self {
            predicate: Arc::new(|_| true),
            name: "always",
        }
    }

    /// Never evict anything.
    pub fn never() -> Self {
        Self {
            predicate: Arc::new(|_| false),
            name: "never",
        }
    }

    /// Evict resources whose reference count was last touched at least `ttl` ago.
    pub fn unused_for(ttl: Duration) -> Self {
        Self {
            predicate: Arc::new(move |link| link.last_access_time.elapsed() >= ttl),
            name: "unused_for",
        }
    }

    /// Evict resources that were not accessed since the previous recycle pass.
    pub fn not_accessed_since_last_recycle() -> Self {
        Self {
            predicate: Arc::new(|link| link.access_count_since_recycle == 0),
            name: "not_accessed_since_last_recycle",
        }
    }

    /// Evaluate the policy for one link.
    pub fn should_recycle(&self, link: &ResourceLinkInfo) -> bool {
        (self.predicate)(link)
    }
}

impl Default for RecyclePolicy {
    fn default() -> Self {
        Self::always()
    }
}

impl fmt::Debug for RecyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecyclePolicy").field(&self.name).finish()
    }
}
