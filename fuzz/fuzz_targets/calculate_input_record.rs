#![no_main]

use easycalc::calculate;
use easycalc::codec::{decode_input, encode_input};
use easycalc::input::InputRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: InputRecord| {
    let _ = calculate(&input);
    let _ = decode_input(&encode_input(&input));
});
