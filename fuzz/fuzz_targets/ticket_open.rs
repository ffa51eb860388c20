#![no_main]

use libfuzzer_sys::fuzz_target;
use fsg_tickets::{open_ticket, to_display_string, KeyMaterial, SecurityProfile};

fuzz_target!(|data: &[u8]| {
    let keys = KeyMaterial::initialize(
        SecurityProfile::QuantumResistant,
        Some(vec![0x42; 32]),
        Some(vec![0x24; 32]),
    )
    .unwrap();
    // Arbitrary strings and arbitrary well-formed payloads must never panic
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = open_ticket(&keys, s);
    }
    for profile in SecurityProfile::ALL {
        if data.len() == profile.total_len() {
            let s = to_display_string(data, profile).unwrap();
            let _ = open_ticket(&keys, &s);
        }
    }
});
