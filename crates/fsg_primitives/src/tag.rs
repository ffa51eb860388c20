//! Keyed tags: HMAC-SHA-256 over a sequence of parts, optionally truncated.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{constants::TAG_FULL_LEN, PrimitiveError, Tag256};

type HmacSha256 = Hmac<Sha256>;

/// `HMAC_SHA256(key, p_0 || p_1 || ... )`.
///
/// Parts are concatenated without framing; callers own the layout.
pub fn keyed_hash(key: &[u8], parts: &[&[u8]]) -> Result<Tag256, PrimitiveError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| PrimitiveError::MacKey)?;
    for p in parts {
        mac.update(p);
    }
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; TAG_FULL_LEN];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// First `len` bytes of [`keyed_hash`].
pub fn truncated_tag(key: &[u8], parts: &[&[u8]], len: usize) -> Result<Vec<u8>, PrimitiveError> {
    if len > TAG_FULL_LEN {
        return Err(PrimitiveError::TagLength { requested: len, max: TAG_FULL_LEN });
    }
    let full = keyed_hash(key, parts)?;
    Ok(full[..len].to_vec())
}
