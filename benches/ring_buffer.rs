use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loadbench::RingBuffer;
use std::sync::Arc;
use std::thread;

fn push_get(c: &mut Criterion) {
    let ring = RingBuffer::new(1024);
    c.bench_function("ring push+get", |b| {
        b.iter(|| {
            let _ = ring.push(black_box(42u64));
            black_box(ring.get())
        })
    });
}

fn contended_push_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring contended");
    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let ring = Arc::new(RingBuffer::new(256));
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let ring = Arc::clone(&ring);
                        thread::spawn(move || {
                            for i in 0..1_000u64 {
                                let _ = ring.push(i);
                                black_box(ring.get());
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, push_get, contended_push_get);
criterion_main!(benches);
