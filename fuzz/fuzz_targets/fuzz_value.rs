#![no_main]
use libfuzzer_sys::fuzz_target;
use photon_loot::{read_value, ByteCursor};

fuzz_target!(|data: &[u8]| {
    if let Some((&tag, rest)) = data.split_first() {
        let mut cursor = ByteCursor::new(rest);
        if read_value(tag, &mut cursor).is_ok() {
            assert!(cursor.position() <= rest.len());
        }
    }
});
