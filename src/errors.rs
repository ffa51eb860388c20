use std::time::Duration;

use fsg_primitives::PrimitiveError;
use thiserror::Error;

use crate::{rate_limit::Action, types::SecurityProfile};

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("invalid cipher key length: expected {expected} got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("invalid salt length: {got} not in [{min}, {max}]")]
    InvalidSaltLength { min: usize, max: usize, got: usize },

    #[error("invalid length: expected {expected} got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("category number {0} not in [0, 225]")]
    CategoryOutOfRange(u16),

    #[error("duplicate category number {0}")]
    DuplicateCategory(u8),

    #[error("duplicate category locator {0:?}")]
    DuplicateLocator(String),

    #[error("live window ({live} units) must be non-zero and shorter than the dead window ({dead} units)")]
    InvalidWindows { live: u64, dead: u64 },

    #[error("a salt is required to issue tickets")]
    MissingSalt,

    #[error("profile {profile} needs a {expected}-byte key, loaded key has {got} bytes")]
    ProfileKeyMismatch { profile: SecurityProfile, expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no category has any items")]
    CatalogEmpty,

    #[error("category {0} not found")]
    CategoryNotFound(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("{action} throttled, retry in {retry_after:?}")]
    Throttled { action: Action, retry_after: Duration },

    #[error("ticket format error: {0}")]
    Format(&'static str),

    #[error("malformed ticket block of {got} bytes")]
    MalformedBlock { got: usize },

    #[error("clock outside the ticket timestamp range")]
    ClockOutOfRange,

    #[error("entropy source failed: {0}")]
    Entropy(String),

    #[error("seed file error: {0}")]
    SeedFile(&'static str),

    #[error(transparent)]
    Crypto(#[from] PrimitiveError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TicketError {
    /// Errors caused by bad keys, salts, catalogs or settings rather than by
    /// a particular request.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyLength { .. }
                | Self::InvalidSaltLength { .. }
                | Self::CategoryOutOfRange(_)
                | Self::DuplicateCategory(_)
                | Self::DuplicateLocator(_)
                | Self::InvalidWindows { .. }
                | Self::MissingSalt
                | Self::ProfileKeyMismatch { .. }
                | Self::InvalidConfig(_)
                | Self::CatalogEmpty
        )
    }
}

/// Why a verification was rejected.
///
/// The variants carry no detail so that callers can hand them to untrusted
/// clients without leaking which part of a forged ticket was wrong.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyFailure {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("ticket could not be decoded")]
    Decode,

    #[error("ticket is forged or corrupted")]
    Authentication,

    #[error("ticket was issued for a different seed")]
    SeedMismatch,

    #[error("ticket was issued for a different category")]
    CategoryMismatch,

    #[error("ticket is outside its usable period")]
    PeriodInvalid,
}
