use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hostpulse::model::data::MemoryFrame;
use hostpulse::RollingWindow;

/// Benchmark rolling window push + average at several window sizes
fn bench_rolling_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_window");

    for size in [5usize, 20, 100] {
        group.bench_with_input(BenchmarkId::new("push_average", size), &size, |b, &size| {
            let mut window = RollingWindow::new(size);
            let mut value = 0.0f64;
            b.iter(|| {
                value += 1.0;
                window.push(value);
                window.average()
            })
        });
    }

    group.finish();
}

/// Benchmark decoding a memory data frame
fn bench_frame_decoding(c: &mut Criterion) {
    let frame = r#"{"type":"data","usagePercent":55.5,"usedMB":4520,"totalMB":8192,"capturedAt":"2024-01-01T00:00:00Z"}"#;

    c.bench_function("memory_frame_decode", |b| {
        b.iter(|| serde_json::from_str::<MemoryFrame>(frame).expect("Should decode"))
    });
}

criterion_group!(benches, bench_rolling_window, bench_frame_decoding);
criterion_main!(benches);
