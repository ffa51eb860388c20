#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

//! FSG ticket primitives: keyed tags, AES block transforms, constant-time equality.
//
// This crate holds the pure cryptographic building blocks shared by the
// ticket engine and its offline tooling:
//
// - HMAC-SHA-256 over concatenated parts, with prefix truncation
// - AES-128/192/256 in ECB mode over whole 16-byte blocks
// - Constant-time equality for tags

use subtle::ConstantTimeEq;
use thiserror::Error;

/// 32-byte HMAC-SHA-256 output.
pub type Tag256 = [u8; 32];

pub mod cipher;
pub mod constants;
pub mod tag;

pub use cipher::{ecb_decrypt, ecb_encrypt, BlockCipher};
pub use tag::{keyed_hash, truncated_tag};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("unsupported cipher key length {got} (expected 16, 24 or 32)")]
    KeyLength { got: usize },

    #[error("input of {len} bytes is not a whole number of cipher blocks")]
    UnalignedInput { len: usize },

    #[error("tag length {requested} exceeds {max}")]
    TagLength { requested: usize, max: usize },

    #[error("mac key rejected")]
    MacKey,
}

/// Constant-time equality for two byte strings.
///
/// Slices of different lengths compare unequal; the length itself is not secret.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
