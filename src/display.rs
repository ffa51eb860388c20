//! Human-readable ticket strings.
//!
//! A ticket is shown as its version marker followed by one `-xxxxxxxxxxxxxxxx`
//! group per 8 bytes of ciphertext:
//!
//! ```text
//! 4-0123456789abcdef-0123456789abcdef-0123456789abcdef-0123456789abcdef
//! ```
//!
//! Output is always lowercase; input hex is accepted in either case.

use crate::{errors::TicketError, types::SecurityProfile};

pub const SEPARATOR: u8 = b'-';
pub const GROUP_BYTES: usize = 8;
const GROUP_HEX: usize = GROUP_BYTES * 2;
const GROUP_STRIDE: usize = GROUP_HEX + 1;

/// Length of the display string for `profile` (35 or 69).
#[must_use]
pub const fn display_len(profile: SecurityProfile) -> usize {
    1 + (profile.total_len() / GROUP_BYTES) * GROUP_STRIDE
}

/// # Errors
///
/// `InvalidLength` when `sealed` is not `profile.total_len()` bytes.
pub fn to_display_string(sealed: &[u8], profile: SecurityProfile) -> Result<String, TicketError> {
    if sealed.len() != profile.total_len() {
        return Err(TicketError::InvalidLength {
            expected: profile.total_len(),
            got: sealed.len(),
        });
    }
    let mut s = String::with_capacity(display_len(profile));
    s.push(profile.marker());
    for group in sealed.chunks(GROUP_BYTES) {
        s.push(char::from(SEPARATOR));
        s.push_str(&hex::encode(group));
    }
    Ok(s)
}

/// Parse a display string into its ciphertext and the profile named by its marker.
///
/// # Errors
///
/// `Format` for an unknown marker, a length that does not match the marker,
/// a misplaced separator or a non-hex digit.
pub fn from_display_string(s: &str) -> Result<(Vec<u8>, SecurityProfile), TicketError> {
    let marker = s.chars().next().ok_or(TicketError::Format("empty ticket"))?;
    let profile = SecurityProfile::from_marker(marker)
        .ok_or(TicketError::Format("unknown version marker"))?;
    let bytes = s.as_bytes();
    if bytes.len() != display_len(profile) {
        return Err(TicketError::Format("wrong length for version"));
    }

    let mut digits = Vec::with_capacity(profile.total_len() * 2);
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        let at_separator = (i - 1) % GROUP_STRIDE == 0;
        match (at_separator, b == SEPARATOR) {
            (true, true) => {}
            (false, false) => digits.push(b),
            _ => return Err(TicketError::Format("misplaced separator")),
        }
    }
    let sealed = hex::decode(&digits).map_err(|_| TicketError::Format("invalid hex digit"))?;
    Ok((sealed, profile))
}
