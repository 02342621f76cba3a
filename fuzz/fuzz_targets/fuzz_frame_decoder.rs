#![no_main]
use libfuzzer_sys::fuzz_target;
use photon_loot::FrameDecoder;

// Arbitrary datagrams, fed twice so partial fragment state carries over
fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::default();
    let _ = decoder.handle_packet(data);
    let _ = decoder.handle_packet(data);
});
