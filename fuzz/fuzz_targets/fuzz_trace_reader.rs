#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(rows) = keycal_config::read_trace(data, 88) {
        for row in rows {
            assert!(row.raw.len() <= 88);
        }
    }
});
