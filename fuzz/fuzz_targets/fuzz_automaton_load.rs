#![no_main]
use libfuzzer_sys::fuzz_target;
use packetmatch::StateTable;

fuzz_target!(|data: &[u8]| {
    // Never crash or panic on garbage input, regardless of validation outcome.
    let _ = StateTable::from_buffer(data);
});
