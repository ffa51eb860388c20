//! AES in electronic-code-book mode.
//!
//! Every 16-byte block is transformed on its own. That is only acceptable for
//! plaintexts that never repeat and carry their own authentication, which is
//! what the ticket layout guarantees.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};

use crate::{
    constants::{AES128_KEY_LEN, AES192_KEY_LEN, AES256_KEY_LEN, BLOCK_LEN},
    PrimitiveError,
};

/// AES keyed for 128, 192 or 256 bits, chosen by key length.
#[derive(Clone)]
pub enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    pub fn new(key: &[u8]) -> Result<Self, PrimitiveError> {
        let bad_len = |_| PrimitiveError::KeyLength { got: key.len() };
        match key.len() {
            AES128_KEY_LEN => Aes128::new_from_slice(key).map(Self::Aes128).map_err(bad_len),
            AES192_KEY_LEN => Aes192::new_from_slice(key).map(Self::Aes192).map_err(bad_len),
            AES256_KEY_LEN => Aes256::new_from_slice(key).map(Self::Aes256).map_err(bad_len),
            got => Err(PrimitiveError::KeyLength { got }),
        }
    }

    /// Encrypt `data` in place, block by block.
    pub fn encrypt_in_place(&self, data: &mut [u8]) -> Result<(), PrimitiveError> {
        check_aligned(data)?;
        for chunk in data.chunks_exact_mut(BLOCK_LEN) {
            let block = Block::from_mut_slice(chunk);
            match self {
                Self::Aes128(c) => c.encrypt_block(block),
                Self::Aes192(c) => c.encrypt_block(block),
                Self::Aes256(c) => c.encrypt_block(block),
            }
        }
        Ok(())
    }

    /// Decrypt `data` in place, block by block.
    pub fn decrypt_in_place(&self, data: &mut [u8]) -> Result<(), PrimitiveError> {
        check_aligned(data)?;
        for chunk in data.chunks_exact_mut(BLOCK_LEN) {
            let block = Block::from_mut_slice(chunk);
            match self {
                Self::Aes128(c) => c.decrypt_block(block),
                Self::Aes192(c) => c.decrypt_block(block),
                Self::Aes256(c) => c.decrypt_block(block),
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let bits = match self {
            Self::Aes128(_) => 128,
            Self::Aes192(_) => 192,
            Self::Aes256(_) => 256,
        };
        write!(f, "BlockCipher(AES-{bits})")
    }
}

const fn check_aligned(data: &[u8]) -> Result<(), PrimitiveError> {
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return Err(PrimitiveError::UnalignedInput { len: data.len() });
    }
    Ok(())
}

/// ECB-encrypt a whole number of blocks under `key`.
pub fn ecb_encrypt(key: &[u8], plain: &[u8]) -> Result<Vec<u8>, PrimitiveError> {
    let cipher = BlockCipher::new(key)?;
    let mut out = plain.to_vec();
    cipher.encrypt_in_place(&mut out)?;
    Ok(out)
}

/// ECB-decrypt a whole number of blocks under `key`.
pub fn ecb_decrypt(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, PrimitiveError> {
    let cipher = BlockCipher::new(key)?;
    let mut out = sealed.to_vec();
    cipher.decrypt_in_place(&mut out)?;
    Ok(out)
}
