use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packetmatch::compiler::AutomatonBuilder;
use packetmatch::pipeline::Pipeline;
use packetmatch::scanner::{Scanner, ScannerStats};
use packetmatch::state_table::StateTable;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_capture(packet_count: usize, packet_size: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let payload = vec![b'a'; packet_size];
    for _ in 0..packet_count {
        file.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
        file.write_all(&payload).unwrap();
    }
    file.flush().unwrap();
    file
}

fn run_pipeline(path: &std::path::Path, table: &StateTable, worker_count: usize) -> ScannerStats {
    let pipeline = Pipeline::start(path.to_path_buf(), worker_count).unwrap();
    let mut total = ScannerStats::default();
    std::thread::scope(|scope| {
        let handles: Vec<_> = pipeline
            .receivers
            .iter()
            .map(|rx| {
                scope.spawn(move || {
                    let mut scanner = Scanner::new(table, None, false).unwrap();
                    scanner.run(rx, |_| {}).unwrap();
                    scanner.stats()
                })
            })
            .collect();
        for h in handles {
            total.merge(&h.join().unwrap());
        }
    });
    pipeline.join().unwrap();
    total
}

fn bench_worker_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_worker_scaling");

    let built = AutomatonBuilder::new()
        .add_pattern(b"needle")
        .add_pattern(b"aaaa")
        .build()
        .unwrap();
    let table = StateTable::from_buffer(&built.buffer).unwrap();

    let packet_count = 20_000;
    let packet_size = 256;
    let file = write_capture(packet_count, packet_size);
    let total_bytes = (packet_count * packet_size) as u64;

    for &workers in &[1usize, 2, 4, 8] {
        group.throughput(Throughput::Bytes(total_bytes));
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &workers,
            |b, &workers| {
                b.iter(|| black_box(run_pipeline(file.path(), &table, workers)));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_worker_scaling);
criterion_main!(benches);
