#![forbid(unsafe_code)]

/// AES block width; every ticket plaintext is a whole number of these.
pub const BLOCK_LEN: usize = 16;

/// HMAC-SHA-256 output width, the upper bound for any truncated tag.
pub const TAG_FULL_LEN: usize = 32;

pub const AES128_KEY_LEN: usize = 16;
pub const AES192_KEY_LEN: usize = 24;
pub const AES256_KEY_LEN: usize = 32;

/// Cipher key lengths accepted by [`crate::cipher::BlockCipher`].
pub const CIPHER_KEY_LENS: [usize; 3] = [AES128_KEY_LEN, AES192_KEY_LEN, AES256_KEY_LEN];
