#![no_main]

use easycalc::output::SinkOutput;
use easycalc::{run_project, ProjectFlags};
use libfuzzer_sys::fuzz_target;
use std::io::{BufReader, Cursor};

fuzz_target!(|data: &[u8]| {
    for flags in [ProjectFlags::empty(), ProjectFlags::ENCODED_INPUT] {
        let _run = run_project(BufReader::new(Cursor::new(data)), SinkOutput, &flags);
    }
});
