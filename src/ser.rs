use crate::{
    errors::TicketError,
    types::{
        Item, SecurityProfile, TicketFields, Timestamp, CATEGORY_LEN, CORE_LEN, ITEM_LEN,
        TIMESTAMP_LEN,
    },
};

const CATEGORY_OFF: usize = ITEM_LEN;
const TIMESTAMP_OFF: usize = ITEM_LEN + CATEGORY_LEN;

#[inline]
#[must_use]
pub const fn be32(x: u32) -> [u8; 4] {
    x.to_be_bytes()
}

/// core = item(8) || category(1) || `BE32(timestamp)`
#[must_use]
pub fn core_bytes(item: &Item, category: u8, timestamp: Timestamp) -> [u8; CORE_LEN] {
    let mut out = [0u8; CORE_LEN];
    out[..ITEM_LEN].copy_from_slice(&item.0);
    out[CATEGORY_OFF] = category;
    out[TIMESTAMP_OFF..TIMESTAMP_OFF + TIMESTAMP_LEN].copy_from_slice(&be32(timestamp.units()));
    out
}

/// Plaintext block: core || tag, exactly `profile.total_len()` bytes.
///
/// # Errors
///
/// `InvalidLength` when the tag is not `profile.tag_len()` bytes.
pub fn encode_block(fields: &TicketFields, profile: SecurityProfile) -> Result<Vec<u8>, TicketError> {
    if fields.tag.len() != profile.tag_len() {
        return Err(TicketError::InvalidLength {
            expected: profile.tag_len(),
            got: fields.tag.len(),
        });
    }
    let mut v = Vec::with_capacity(profile.total_len());
    v.extend_from_slice(&core_bytes(&fields.item, fields.category, fields.timestamp)); // 13
    v.extend_from_slice(&fields.tag); // 3 or 19
    debug_assert_eq!(v.len(), profile.total_len());
    Ok(v)
}

/// Split a plaintext block back into its fields.
///
/// # Errors
///
/// `MalformedBlock` unless the block is 16 or 32 bytes.
pub fn decode_block(block: &[u8]) -> Result<TicketFields, TicketError> {
    let total = block.len();
    if !SecurityProfile::ALL.iter().any(|p| p.total_len() == total) {
        return Err(TicketError::MalformedBlock { got: total });
    }
    let item = Item::try_from(&block[..ITEM_LEN])?;
    let category = block[CATEGORY_OFF];
    let mut ts = [0u8; TIMESTAMP_LEN];
    ts.copy_from_slice(&block[TIMESTAMP_OFF..CORE_LEN]);
    Ok(TicketFields {
        item,
        category,
        timestamp: Timestamp(u32::from_be_bytes(ts)),
        tag: block[CORE_LEN..].to_vec(),
    })
}
