use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packetmatch::compiler::AutomatonBuilder;
use packetmatch::dict_builder::{DictEntrySpec, DictionaryBuilder};
use packetmatch::dictionary::{Dictionary, RollingHash};
use packetmatch::engine;
use packetmatch::scanner::Scanner;
use packetmatch::state_table::StateTable;

const CHUNK_WIDTH: usize = 16;

fn build_dictionary(entry_count: usize) -> Vec<u8> {
    let mut builder = DictionaryBuilder::new(CHUNK_WIDTH);
    for i in 0..entry_count {
        let chunk: Vec<u8> = format!("{:016x}", i).into_bytes();
        builder = builder
            .add_entry(DictEntrySpec {
                chunk,
                entry_state_id: 0,
                exit_state_id: 0,
                inner_matches: vec![],
            })
            .unwrap();
    }
    builder.build().unwrap()
}

fn bench_rolling_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_hash");
    let data = vec![b'x'; 1 << 16];

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("init_and_roll", |b| {
        b.iter(|| {
            let mut rh = RollingHash::new(CHUNK_WIDTH);
            let mut hash = rh.init(&data[..CHUNK_WIDTH]).unwrap();
            for i in CHUNK_WIDTH..data.len() {
                hash = rh.roll(data[i - CHUNK_WIDTH], data[i]);
            }
            black_box(hash);
        });
    });
    group.finish();
}

fn bench_dictionary_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("dictionary_build");
    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("entries", count), count, |b, &count| {
            b.iter(|| black_box(build_dictionary(count)));
        });
    }
    group.finish();
}

fn bench_dictionary_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dictionary_lookup");
    for count in [100, 1_000, 10_000].iter() {
        let buf = build_dictionary(*count);
        let dict = Dictionary::from_buffer(&buf).unwrap();
        let chunk: Vec<u8> = format!("{:016x}", count / 2).into_bytes();
        let mut rh = RollingHash::new(CHUNK_WIDTH);
        let hash = rh.init(&chunk).unwrap();

        group.bench_with_input(BenchmarkId::new("hit", count), count, |b, _| {
            b.iter(|| black_box(dict.lookup(hash, &chunk, 0).unwrap()));
        });
    }
    group.finish();
}

fn bench_scan_with_and_without_dictionary(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_with_dictionary");

    let built = AutomatonBuilder::new().add_pattern(b"needle").build().unwrap();
    let table = StateTable::from_buffer(&built.buffer).unwrap();

    let mut payload = Vec::new();
    for i in 0..4096 {
        payload.extend_from_slice(format!("{:016x}", i).as_bytes());
    }

    let dict_buf = build_dictionary(4096);
    let dict = Dictionary::from_buffer(&dict_buf).unwrap();

    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("plain_scan", |b| {
        b.iter(|| black_box(engine::scan(&table, black_box(&payload)).unwrap()));
    });
    group.bench_function("dictionary_scan", |b| {
        b.iter(|| {
            let mut scanner = Scanner::new(&table, Some(&dict), false).unwrap();
            let (tx, rx) = crossbeam_channel::unbounded();
            tx.send((
                0u64,
                packetmatch::capture::Packet {
                    payload: payload.clone(),
                    with_headers_len: 0,
                },
            ))
            .unwrap();
            drop(tx);
            let mut hits = Vec::new();
            scanner.run(&rx, |m| hits.push(m)).unwrap();
            black_box(hits);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_rolling_hash,
    bench_dictionary_build,
    bench_dictionary_lookup,
    bench_scan_with_and_without_dictionary
);
criterion_main!(benches);
