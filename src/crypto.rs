use fsg_primitives::{ct_eq, ecb_decrypt, ecb_encrypt, truncated_tag};

use crate::{
    errors::TicketError,
    ser::core_bytes,
    types::{Item, TicketFields, Timestamp},
};

/// tag = HMAC-SHA-256(salt, core) truncated to `tag_len` bytes.
///
/// # Errors
///
/// Propagates primitive failures (oversized `tag_len`).
pub fn compute_tag(
    item: &Item,
    category: u8,
    timestamp: Timestamp,
    salt: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, TicketError> {
    let core = core_bytes(item, category, timestamp);
    Ok(truncated_tag(salt, &[&core[..]], tag_len)?)
}

/// Recompute the tag of `fields` and compare it in constant time.
///
/// # Errors
///
/// Propagates primitive failures.
pub fn tag_matches(fields: &TicketFields, salt: &[u8]) -> Result<bool, TicketError> {
    let expected = compute_tag(
        &fields.item,
        fields.category,
        fields.timestamp,
        salt,
        fields.tag.len(),
    )?;
    Ok(ct_eq(&expected, &fields.tag))
}

/// # Errors
///
/// Bad key length or unaligned block.
pub fn encrypt_block(key: &[u8], plain: &[u8]) -> Result<Vec<u8>, TicketError> {
    Ok(ecb_encrypt(key, plain)?)
}

/// # Errors
///
/// Bad key length or unaligned block.
pub fn decrypt_block(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, TicketError> {
    Ok(ecb_decrypt(key, sealed)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const SALT: [u8; 32] = [0x5a; 32];

    #[test]
    fn tag_depends_on_every_core_field() {
        let base = compute_tag(&Item::from_i64(1), 2, Timestamp(3), &SALT, 19).unwrap();
        let variants = [
            compute_tag(&Item::from_i64(9), 2, Timestamp(3), &SALT, 19).unwrap(),
            compute_tag(&Item::from_i64(1), 9, Timestamp(3), &SALT, 19).unwrap(),
            compute_tag(&Item::from_i64(1), 2, Timestamp(9), &SALT, 19).unwrap(),
        ];
        for v in variants {
            assert_ne!(v, base);
        }
    }

    #[test]
    fn short_tag_is_prefix_of_long_tag() {
        let long = compute_tag(&Item::from_i64(1), 2, Timestamp(3), &SALT, 19).unwrap();
        let short = compute_tag(&Item::from_i64(1), 2, Timestamp(3), &SALT, 3).unwrap();
        assert_eq!(short.as_slice(), &long[..3]);
    }

    #[test]
    fn tag_matches_detects_flip() {
        let tag = compute_tag(&Item::from_i64(1), 2, Timestamp(3), &SALT, 19).unwrap();
        let mut fields = TicketFields {
            item: Item::from_i64(1),
            category: 2,
            timestamp: Timestamp(3),
            tag,
        };
        assert!(tag_matches(&fields, &SALT).unwrap());
        fields.tag[0] ^= 1;
        assert!(!tag_matches(&fields, &SALT).unwrap());
    }

    #[test]
    fn block_cipher_round_trip() {
        let key = [7u8; 24];
        let plain = [1u8; 32];
        let sealed = encrypt_block(&key, &plain).unwrap();
        assert_ne!(sealed.as_slice(), &plain[..]);
        assert_eq!(decrypt_block(&key, &sealed).unwrap().as_slice(), &plain[..]);
    }
}
