use std::time::Duration;

use crate::{
    crypto::{compute_tag, decrypt_block, encrypt_block, tag_matches},
    display::{from_display_string, to_display_string},
    errors::{TicketError, VerifyFailure},
    keys::KeyMaterial,
    ser::{decode_block, encode_block},
    types::{
        Confidence, Item, Period, SecurityProfile, TicketFields, Timestamp, DEFAULT_DEAD_SECS,
        DEFAULT_LIVE_SECS, UNITS_PER_SEC,
    },
};

/// Live and dead windows in timestamp units, both measured from issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindows {
    live: u64,
    dead: u64,
}

impl PeriodWindows {
    /// # Errors
    ///
    /// `InvalidWindows` unless `0 < live < dead`.
    pub const fn from_units(live: u64, dead: u64) -> Result<Self, TicketError> {
        if live == 0 || live >= dead {
            return Err(TicketError::InvalidWindows { live, dead });
        }
        Ok(Self { live, dead })
    }

    /// # Errors
    ///
    /// `InvalidWindows` unless `0 < live < dead`.
    pub const fn from_secs(live: u64, dead: u64) -> Result<Self, TicketError> {
        Self::from_units(live.saturating_mul(UNITS_PER_SEC), dead.saturating_mul(UNITS_PER_SEC))
    }

    #[must_use]
    pub const fn live_units(&self) -> u64 {
        self.live
    }

    #[must_use]
    pub const fn dead_units(&self) -> u64 {
        self.dead
    }

    #[must_use]
    pub const fn live(&self) -> Duration {
        Duration::from_millis(self.live.saturating_mul(125))
    }

    #[must_use]
    pub const fn dead(&self) -> Duration {
        Duration::from_millis(self.dead.saturating_mul(125))
    }
}

impl Default for PeriodWindows {
    fn default() -> Self {
        Self {
            live: DEFAULT_LIVE_SECS * UNITS_PER_SEC,
            dead: DEFAULT_DEAD_SECS * UNITS_PER_SEC,
        }
    }
}

/// `now < ts` is invalid; `[ts, ts+live)` live; `[ts+live, ts+dead)` dead; later invalid.
#[must_use]
pub fn classify_period(timestamp: Timestamp, now: Timestamp, windows: &PeriodWindows) -> Period {
    let (ts, now) = (u64::from(timestamp.units()), u64::from(now.units()));
    if now < ts {
        return Period::Invalid;
    }
    let age = now - ts;
    if age < windows.live {
        Period::Live
    } else if age < windows.dead {
        Period::Dead
    } else {
        Period::Invalid
    }
}

/// Time left in the live window, `None` once it has ended.
#[must_use]
pub fn live_remaining(timestamp: Timestamp, now: Timestamp, windows: &PeriodWindows) -> Option<Duration> {
    let end = u64::from(timestamp.units()).saturating_add(windows.live);
    let now = u64::from(now.units());
    (now < end).then(|| Duration::from_millis((end - now).saturating_mul(125)))
}

/// Build, authenticate, encrypt and format a ticket.
///
/// # Errors
///
/// `ProfileKeyMismatch`, `MissingSalt`, or primitive failures.
pub fn seal_ticket(
    keys: &KeyMaterial,
    profile: SecurityProfile,
    item: Item,
    category: u8,
    timestamp: Timestamp,
) -> Result<String, TicketError> {
    keys.check_profile(profile)?;
    let salt = keys.salt().ok_or(TicketError::MissingSalt)?;
    let tag = compute_tag(&item, category, timestamp, salt, profile.tag_len())?;
    let fields = TicketFields { item, category, timestamp, tag };
    let plain = encode_block(&fields, profile)?;
    let sealed = encrypt_block(keys.cipher_key(), &plain)?;
    to_display_string(&sealed, profile)
}

/// A ticket string after decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTicket {
    pub profile: SecurityProfile,
    pub fields: TicketFields,
    pub confidence: Confidence,
}

/// Parse, decrypt and, when a salt is present, authenticate a ticket.
///
/// # Errors
///
/// `Decode` for anything that is not a well-formed ticket for this key,
/// `Authentication` when the tag does not match.
pub fn open_ticket(keys: &KeyMaterial, ticket: &str) -> Result<OpenedTicket, VerifyFailure> {
    let (sealed, profile) = from_display_string(ticket).map_err(|e| {
        tracing::debug!(error = %e, "ticket string rejected");
        VerifyFailure::Decode
    })?;
    if !keys.supports(profile) {
        tracing::debug!(%profile, key_len = keys.cipher_key().len(), "ticket profile does not fit key");
        return Err(VerifyFailure::Decode);
    }
    let plain = decrypt_block(keys.cipher_key(), &sealed).map_err(|_| VerifyFailure::Decode)?;
    let fields = decode_block(&plain).map_err(|_| VerifyFailure::Decode)?;

    let confidence = match keys.salt() {
        Some(salt) => {
            if !tag_matches(&fields, salt).map_err(|_| VerifyFailure::Authentication)? {
                return Err(VerifyFailure::Authentication);
            }
            Confidence::Authenticated
        }
        None => Confidence::StructuralOnly,
    };
    Ok(OpenedTicket { profile, fields, confidence })
}
