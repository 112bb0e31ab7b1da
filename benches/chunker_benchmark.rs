//! Chunking and identity benchmarks

use chunked_uploadr::chunker;
use chunked_uploadr::identity::{ContentIdentity, IdentityStrategy, NameIdentity};
use chunked_uploadr::upload::SelectedFile;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn benchmark_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for total in [1024 * 1024u64, 1024 * 1024 * 1024, 64 * 1024 * 1024 * 1024].iter() {
        group.bench_with_input(format!("{}_bytes", total), total, |b, &total| {
            b.iter(|| chunker::partition(black_box(total), chunker::DEFAULT_CHUNK_SIZE));
        });
    }

    group.finish();
}

fn benchmark_identity(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("identity");

    let name_only = SelectedFile::from_bytes("quarterly-report.pdf", vec![0u8; 16]);
    group.bench_function("name", |b| {
        b.to_async(&runtime)
            .iter(|| async { NameIdentity.derive(black_box(&name_only)).await });
    });

    for size in [64 * 1024usize, 4 * 1024 * 1024].iter() {
        let file = SelectedFile::from_bytes("payload.bin", vec![7u8; *size]);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(format!("content_{}_bytes", size), &file, |b, file| {
            b.to_async(&runtime)
                .iter(|| async { ContentIdentity.derive(black_box(file)).await });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_partition, benchmark_identity);
criterion_main!(benches);
