#![no_main]
use keycal_hardware::eeprom::{decode_image, encode_image};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any accepted image must survive a re-encode with identical bits.
    if let Ok(Some(rec)) = decode_image(data) {
        let again = encode_image(&rec.table, rec.write_count).expect("re-encode decoded table");
        let back = decode_image(&again).expect("decode re-encoded").expect("not erased");
        assert_eq!(back.write_count, rec.write_count);
        assert_eq!(back.table.len(), rec.table.len());
        for (a, b) in back.table.iter().zip(&rec.table) {
            assert_eq!(a.gain.to_bits(), b.gain.to_bits());
            assert_eq!(a.offset.to_bits(), b.offset.to_bits());
        }
    }
});
