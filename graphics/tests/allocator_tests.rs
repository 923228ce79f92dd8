//! Integration tests for the resource allocator.
//!
//! These tests drive [`ResourceAllocator`] through its public API against a
//! recording [`TestFactory`](common::TestFactory).
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test allocator_tests
//! ```

mod common;

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use common::{TestFactory, init_logging, render_target, uniform};
use redlilium_graphics::{
    Buffer, GraphicsError, QueryType, RecyclePolicy, ResourceAllocator, ResourceKind,
};

fn allocator_with(factory: &Arc<TestFactory>) -> ResourceAllocator {
    init_logging();
    ResourceAllocator::with_factory(factory.clone()).with_name("test")
}

// ============================================================================
// Checkout / Release
// ============================================================================

#[rstest]
#[case::single(1)]
#[case::few(3)]
#[case::many(8)]
fn test_outstanding_checkouts_are_distinct(#[case] outstanding: usize) {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let buffers: Vec<Arc<Buffer>> = (0..outstanding)
        .map(|_| allocator.get_temporary_buffer(&uniform(256)).unwrap())
        .collect();

    for (i, a) in buffers.iter().enumerate() {
        for b in &buffers[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(256)), Some(outstanding));

    for buffer in &buffers {
        allocator.release_reference(buffer).unwrap();
    }

    // Releasing everything and checking out again never grows the bucket.
    let again: Vec<Arc<Buffer>> = (0..outstanding)
        .map(|_| allocator.get_temporary_buffer(&uniform(256)).unwrap())
        .collect();
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(256)), Some(outstanding));
    assert_eq!(factory.created(), outstanding as u64);
    for buffer in &again {
        allocator.release_reference(buffer).unwrap();
    }
}

#[test]
fn test_add_reference_round_trip() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let buffer = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.add_reference(&buffer).unwrap();
    assert_eq!(allocator.reference_count(&buffer), Some(2));

    allocator.release_reference(&buffer).unwrap();
    allocator.release_reference(&buffer).unwrap();
    assert_eq!(allocator.reference_count(&buffer), Some(0));

    let reused = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    assert!(Arc::ptr_eq(&buffer, &reused));
    allocator.release_reference(&reused).unwrap();
}

#[test]
fn test_over_release_is_rejected() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let buffer = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.add_reference(&buffer).unwrap();
    allocator.release_reference(&buffer).unwrap();
    allocator.release_reference(&buffer).unwrap();

    let err = allocator.release_reference(&buffer).unwrap_err();
    assert_eq!(
        err,
        GraphicsError::ReferenceCountUnderflow {
            current: 0,
            delta: -1
        }
    );
    assert_eq!(allocator.reference_count(&buffer), Some(0));
    assert_eq!(allocator.stats().releases, 2);
}

#[test]
fn test_unreferenced_hook_fires_once_per_transition() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let buffer = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.add_reference(&buffer).unwrap();
    allocator.release_reference(&buffer).unwrap();
    assert_eq!(factory.unreferenced_count("test-Buffer-0"), 0);

    allocator.release_reference(&buffer).unwrap();
    assert_eq!(factory.unreferenced_count("test-Buffer-0"), 1);

    // A rejected over-release does not notify again.
    assert!(allocator.release_reference(&buffer).is_err());
    assert_eq!(factory.unreferenced_count("test-Buffer-0"), 1);

    let reused = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.release_reference(&reused).unwrap();
    assert_eq!(factory.unreferenced_count("test-Buffer-0"), 2);
    assert_eq!(factory.unreferenced_total(), 2);
}

#[test]
fn test_query_pools_are_cached_by_type_and_count() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let timestamps = allocator.get_query_pool(QueryType::Timestamp, 32).unwrap();
    allocator.release_reference(&timestamps).unwrap();

    let occlusion = allocator.get_query_pool(QueryType::Occlusion, 32).unwrap();
    assert!(!Arc::ptr_eq(&timestamps, &occlusion));
    allocator.release_reference(&occlusion).unwrap();

    let again = allocator.get_query_pool(QueryType::Timestamp, 32).unwrap();
    assert!(Arc::ptr_eq(&timestamps, &again));
    allocator.release_reference(&again).unwrap();

    assert_eq!(allocator.stats().query_pools.resident, 2);
    assert_eq!(
        allocator
            .recycle_kind(ResourceKind::QueryPool, &RecyclePolicy::always())
            .unwrap(),
        2
    );
}

// ============================================================================
// Leases
// ============================================================================

#[test]
fn test_lease_releases_on_drop() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let texture = {
        let lease = allocator.checkout_texture(&render_target(64, 64)).unwrap();
        assert_eq!(lease.width(), 64);
        assert_eq!(allocator.reference_count(lease.resource()), Some(1));

        let shared = lease.share().unwrap();
        assert_eq!(allocator.reference_count(shared.resource()), Some(2));
        Arc::clone(lease.resource())
    };

    assert_eq!(allocator.reference_count(&texture), Some(0));
    assert_eq!(allocator.stats().referenced(), 0);
}

#[test]
fn test_lease_into_inner_detaches() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let lease = allocator.checkout_buffer(&uniform(128)).unwrap();
    let buffer = lease.into_inner();
    assert_eq!(allocator.reference_count(&buffer), Some(1));

    allocator.release_reference(&buffer).unwrap();
    assert_eq!(allocator.reference_count(&buffer), Some(0));

    let lease = allocator.checkout_buffer(&uniform(128)).unwrap();
    lease.release().unwrap();
    assert_eq!(allocator.stats().releases, 2);
}

// ============================================================================
// Recycling
// ============================================================================

#[test]
fn test_recycle_is_idempotent() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let kept = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    let freed = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    let other = allocator.get_temporary_texture(&render_target(32, 32)).unwrap();
    allocator.release_reference(&freed).unwrap();
    allocator.release_reference(&other).unwrap();

    assert_eq!(allocator.recycle().unwrap(), 2);
    let after_first = allocator.stats();
    assert_eq!(allocator.recycle().unwrap(), 0);
    let after_second = allocator.stats();

    assert_eq!(after_first.buffers, after_second.buffers);
    assert_eq!(after_first.textures, after_second.textures);
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(64)), Some(1));
    assert!(freed.is_destroyed());
    assert!(!kept.is_destroyed());
    assert_eq!(factory.destroyed(), 2);

    allocator.release_reference(&kept).unwrap();
}

#[rstest]
#[case::long_ttl(Duration::from_secs(3600), 0)]
#[case::zero_ttl(Duration::ZERO, 1)]
fn test_unused_for_policy(#[case] ttl: Duration, #[case] expected: usize) {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let buffer = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.release_reference(&buffer).unwrap();

    let evicted = allocator
        .recycle_with(&RecyclePolicy::unused_for(ttl))
        .unwrap();
    assert_eq!(evicted, expected);
    assert_eq!(allocator.stats().evicted, expected as u64);
}

#[test]
fn test_not_accessed_since_last_recycle_keeps_hot_resources() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);
    allocator.set_recycle_policy(Some(RecyclePolicy::not_accessed_since_last_recycle()));

    // Frame 1: both used.
    let hot = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    let cold = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.release_reference(&hot).unwrap();
    allocator.release_reference(&cold).unwrap();
    assert_eq!(allocator.recycle().unwrap(), 0);

    // Frame 2: only one used.
    let again = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    assert!(Arc::ptr_eq(&again, &hot));
    allocator.release_reference(&again).unwrap();
    assert_eq!(allocator.recycle().unwrap(), 1);

    assert!(cold.is_destroyed());
    assert!(!hot.is_destroyed());
}

#[test]
fn test_rekeyed_resource_is_filed_under_actual_descriptor() {
    let factory = TestFactory::rounding_buffers(256);
    let allocator = allocator_with(&factory);

    let buffer = allocator.get_temporary_buffer(&uniform(100)).unwrap();
    assert_eq!(buffer.size(), 256);
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(100)), Some(0));
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(256)), Some(1));
    assert_eq!(allocator.reference_count(&buffer), Some(1));

    allocator.release_reference(&buffer).unwrap();
    let exact = allocator.get_temporary_buffer(&uniform(256)).unwrap();
    assert!(Arc::ptr_eq(&buffer, &exact));
    allocator.release_reference(&exact).unwrap();

    assert_eq!(allocator.stats().buffers.buckets, 2);
    assert_eq!(allocator.recycle().unwrap(), 1);
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(100)), None);
    assert_eq!(allocator.bucket_len::<Buffer>(&uniform(256)), None);
    assert_eq!(allocator.stats().buffers.buckets, 0);
}

#[test]
fn test_failing_destroy_propagates_from_recycle() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let buffer = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    allocator.release_reference(&buffer).unwrap();

    factory.fail_destroy(true);
    assert_eq!(allocator.recycle(), Err(GraphicsError::DeviceLost));
    factory.fail_destroy(false);
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_teardown_destroys_everything() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let referenced = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    let free = allocator.get_temporary_texture(&render_target(16, 16)).unwrap();
    allocator.release_reference(&free).unwrap();
    let pool = allocator.get_query_pool(QueryType::Timestamp, 8).unwrap();

    assert_eq!(allocator.teardown().unwrap(), 3);
    assert!(referenced.is_destroyed());
    assert!(free.is_destroyed());
    assert!(pool.is_destroyed());
    assert_eq!(allocator.stats().resident(), 0);

    // Untracked after teardown.
    assert_eq!(
        allocator.release_reference(&referenced),
        Err(GraphicsError::ResourceNotOwned {
            kind: ResourceKind::Buffer
        })
    );
}

#[test]
fn test_teardown_continues_past_errors() {
    let factory = TestFactory::new();
    let allocator = allocator_with(&factory);

    let _a = allocator.get_temporary_buffer(&uniform(64)).unwrap();
    let _b = allocator.get_temporary_texture(&render_target(16, 16)).unwrap();

    factory.fail_destroy(true);
    assert_eq!(allocator.teardown(), Err(GraphicsError::DeviceLost));
    assert_eq!(allocator.stats().resident(), 0);
    factory.fail_destroy(false);
}

#[test]
fn test_drop_tears_down() {
    let factory = TestFactory::new();
    {
        let allocator = allocator_with(&factory);
        let _ = allocator.get_temporary_buffer(&uniform(64)).unwrap();
        let _ = allocator.get_temporary_buffer(&uniform(128)).unwrap();
    }
    assert_eq!(factory.destroyed(), 2);
}
