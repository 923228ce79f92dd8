use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use redlilium_graphics::{
    BufferDescriptor, BufferPool, BufferPoolAllocationType, BufferPoolMode, GraphicsDevice,
    RecyclePolicy, ResourceAllocator, TextureDescriptor, TextureFormat, TextureUsage,
};

// ---------------------------------------------------------------------------
// Resource allocator
// ---------------------------------------------------------------------------

fn bench_allocator_checkout_release(c: &mut Criterion) {
    let allocator = ResourceAllocator::new(GraphicsDevice::dummy());
    let descriptor = BufferDescriptor::uniform(256);

    c.bench_function("allocator_checkout_release_hit", |b| {
        b.iter(|| {
            let buffer = allocator.get_temporary_buffer(&descriptor).unwrap();
            allocator.release_reference(black_box(&buffer)).unwrap();
        });
    });
}

fn bench_allocator_checkout_deep_bucket(c: &mut Criterion) {
    let allocator = ResourceAllocator::new(GraphicsDevice::dummy());
    let descriptor = TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT,
    );
    // 63 outstanding leases in front of the one free link.
    let held: Vec<_> = (0..64)
        .map(|_| allocator.get_temporary_texture(&descriptor).unwrap())
        .collect();
    allocator.release_reference(&held[63]).unwrap();

    c.bench_function("allocator_checkout_64_deep_bucket", |b| {
        b.iter(|| {
            let texture = allocator.get_temporary_texture(&descriptor).unwrap();
            allocator.release_reference(black_box(&texture)).unwrap();
        });
    });
}

fn bench_allocator_recycle(c: &mut Criterion) {
    c.bench_function("allocator_recycle_256_buffers", |b| {
        b.iter_batched(
            || {
                let allocator = ResourceAllocator::new(GraphicsDevice::dummy());
                for size in 1..=256u64 {
                    let buffer = allocator
                        .get_temporary_buffer(&BufferDescriptor::uniform(size * 16))
                        .unwrap();
                    allocator.release_reference(&buffer).unwrap();
                }
                allocator
            },
            |allocator| {
                black_box(allocator.recycle_with(&RecyclePolicy::always()).unwrap());
            },
            BatchSize::SmallInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Buffer pool
// ---------------------------------------------------------------------------

fn bench_buffer_pool_allocate(c: &mut Criterion) {
    let allocator = Arc::new(ResourceAllocator::new(GraphicsDevice::dummy()));

    for (name, mode) in [
        ("buffer_pool_fill_64k_shadow", BufferPoolMode::ShadowMemory),
        ("buffer_pool_fill_64k_gpu_offset", BufferPoolMode::GpuOffset),
    ] {
        let mut pool = BufferPool::new(Arc::clone(&allocator), mode, 256, 64 * 1024).unwrap();
        c.bench_function(name, |b| {
            b.iter(|| {
                while pool.can_allocate(192) {
                    black_box(
                        pool.allocate(192, BufferPoolAllocationType::UsedOnce)
                            .unwrap(),
                    );
                }
                pool.reset().unwrap();
            });
        });
    }
}

criterion_group!(
    benches,
    bench_allocator_checkout_release,
    bench_allocator_checkout_deep_bucket,
    bench_allocator_recycle,
    bench_buffer_pool_allocate,
);
criterion_main!(benches);
