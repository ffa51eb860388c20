#![no_main]

use libfuzzer_sys::fuzz_target;
use fsg_tickets::seedfile::parse_seed_file;

fuzz_target!(|data: &[u8]| {
    // Fuzz the seed file parser with arbitrary input
    let _ = parse_seed_file(data);
});
