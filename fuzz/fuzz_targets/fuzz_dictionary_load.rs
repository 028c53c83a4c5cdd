#![no_main]
use libfuzzer_sys::fuzz_target;
use packetmatch::dictionary::Dictionary;

fuzz_target!(|data: &[u8]| {
    let _ = Dictionary::from_buffer(data);
});
