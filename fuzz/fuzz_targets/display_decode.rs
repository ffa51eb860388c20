#![no_main]

use libfuzzer_sys::fuzz_target;
use fsg_tickets::{from_display_string, to_display_string};

fuzz_target!(|data: &[u8]| {
    // Anything that parses must render back to the same string, lowercased
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok((bytes, profile)) = from_display_string(s) {
            let rendered = to_display_string(&bytes, profile).unwrap();
            assert_eq!(rendered, s.to_ascii_lowercase());
        }
    }
});
