#![no_main]
use libfuzzer_sys::fuzz_target;
use packetmatch::compiler::AutomatonBuilder;
use packetmatch::engine;
use packetmatch::StateTable;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split_point = (data[0] as usize).min(data.len() - 1);
    let pattern_data = &data[1..split_point];
    let input = &data[split_point..];

    let mut builder = AutomatonBuilder::new();
    for pattern in pattern_data.split(|&b| b == 0).filter(|p| !p.is_empty()) {
        builder = builder.add_pattern(pattern);
    }

    if let Ok(built) = builder.build() {
        if let Ok(table) = StateTable::from_buffer(&built.buffer) {
            let _ = engine::scan(&table, input);
        }
    }
});
