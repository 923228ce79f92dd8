//! GPU query pool descriptors.

/// Type of the queries held by a query pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryType {
    /// GPU timestamps.
    #[default]
    Timestamp,
    /// Occlusion (samples passed) queries.
    Occlusion,
    /// Pipeline statistics queries.
    PipelineStatistics,
}

/// Descriptor for creating a query pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryPoolDescriptor {
    /// Type of the pooled queries.
    pub query_type: QueryType,
    /// Number of queries in the pool.
    pub count: u32,
}

impl QueryPoolDescriptor {
    /// Create a new query pool descriptor.
    pub fn new(query_type: QueryType, count: u32) -> Self {
        Self { query_type, count }
    }
}
