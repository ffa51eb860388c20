use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::errors::TicketError;

pub const ITEM_LEN: usize = 8;
pub const CATEGORY_LEN: usize = 1;
pub const TIMESTAMP_LEN: usize = 4;
pub const CORE_LEN: usize = ITEM_LEN + CATEGORY_LEN + TIMESTAMP_LEN; // 13 bytes
pub const MAX_CATEGORY: u8 = 225;

pub const UNITS_PER_SEC: u64 = 8;
pub const NANOS_PER_UNIT: u128 = 125_000_000;
pub const EPOCH_UNIX_SECS: u64 = 1_609_459_200; // 2021-01-01T00:00:00Z

pub const MIN_SALT_LEN: usize = 24;
pub const RECOMMENDED_SALT_LEN: usize = 32;
pub const MAX_SALT_LEN: usize = 64;

pub const DEFAULT_LIVE_SECS: u64 = 2 * 60 * 60; // 2 hours
pub const DEFAULT_DEAD_SECS: u64 = 14 * 24 * 60 * 60; // 2 weeks

/// A 64-bit seed, stored as its big-endian bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Item(pub [u8; ITEM_LEN]);

impl Item {
    #[must_use]
    pub const fn from_i64(v: i64) -> Self {
        Self(v.to_be_bytes())
    }

    #[must_use]
    pub const fn from_u64(v: u64) -> Self {
        Self(v.to_be_bytes())
    }

    #[must_use]
    pub const fn as_i64(self) -> i64 {
        i64::from_be_bytes(self.0)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl From<i64> for Item {
    fn from(v: i64) -> Self {
        Self::from_i64(v)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({})", self.as_i64())
    }
}

impl FromStr for Item {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self::from_i64)
            .map_err(|_| TicketError::Format("item is not a signed 64-bit integer"))
    }
}

impl TryFrom<&[u8]> for Item {
    type Error = TicketError;

    fn try_from(b: &[u8]) -> Result<Self, Self::Error> {
        if b.len() != ITEM_LEN {
            return Err(TicketError::InvalidLength { expected: ITEM_LEN, got: b.len() });
        }
        let mut arr = [0u8; ITEM_LEN];
        arr.copy_from_slice(b);
        Ok(Self(arr))
    }
}

/// Category number in `[0, 225]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CategoryNumber(u8);

impl CategoryNumber {
    /// # Errors
    ///
    /// `CategoryOutOfRange` when `n > 225`.
    pub fn new(n: u16) -> Result<Self, TicketError> {
        match u8::try_from(n) {
            Ok(b) if b <= MAX_CATEGORY => Ok(Self(b)),
            _ => Err(TicketError::CategoryOutOfRange(n)),
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CategoryNumber {
    type Error = TicketError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        Self::new(u16::from(b))
    }
}

impl fmt::Display for CategoryNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issuance time in eighths of a second since 2021-01-01T00:00:00Z.
///
/// Conversion from wall-clock time floors: unit `n` covers
/// `[epoch + n * 125ms, epoch + (n + 1) * 125ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Timestamp(pub u32);

#[must_use]
pub fn ticket_epoch() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(EPOCH_UNIX_SECS)
}

impl Timestamp {
    /// # Errors
    ///
    /// `ClockOutOfRange` when `t` is before the epoch or past the last
    /// representable unit.
    pub fn from_system_time(t: SystemTime) -> Result<Self, TicketError> {
        let since = t
            .duration_since(ticket_epoch())
            .map_err(|_| TicketError::ClockOutOfRange)?;
        let units = since.as_nanos() / NANOS_PER_UNIT;
        u32::try_from(units)
            .map(Self)
            .map_err(|_| TicketError::ClockOutOfRange)
    }

    /// # Errors
    ///
    /// `ClockOutOfRange` when the system clock is outside the ticket range.
    pub fn now() -> Result<Self, TicketError> {
        Self::from_system_time(SystemTime::now())
    }

    /// Start of this unit.
    #[must_use]
    pub fn to_system_time(self) -> SystemTime {
        ticket_epoch() + Duration::from_millis(u64::from(self.0) * 125)
    }

    #[must_use]
    pub const fn units(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }
}

/// Usability of a ticket at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Full rewards available.
    Live,
    /// Still acceptable, reduced rewards.
    Dead,
    /// Not yet issued or fully expired.
    Invalid,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Dead => "dead",
            Self::Invalid => "invalid",
        })
    }
}

/// Cipher strength and ticket size.
///
/// | profile            | key | blocks | marker |
/// |--------------------|-----|--------|--------|
/// | `Low`              | 16  | 1      | `1`    |
/// | `Medium`           | 16  | 2      | `2`    |
/// | `High`             | 24  | 2      | `3`    |
/// | `QuantumResistant` | 32  | 2      | `4`    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityProfile {
    Low,
    Medium,
    High,
    #[default]
    QuantumResistant,
}

impl SecurityProfile {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::QuantumResistant];

    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Low | Self::Medium => 16,
            Self::High => 24,
            Self::QuantumResistant => 32,
        }
    }

    #[must_use]
    pub const fn block_count(self) -> usize {
        match self {
            Self::Low => 1,
            Self::Medium | Self::High | Self::QuantumResistant => 2,
        }
    }

    /// Ticket length in bytes (16 or 32).
    #[must_use]
    pub const fn total_len(self) -> usize {
        self.block_count() * fsg_primitives::constants::BLOCK_LEN
    }

    #[must_use]
    pub const fn tag_len(self) -> usize {
        self.total_len() - CORE_LEN
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn tag_bits(self) -> u32 {
        // tag_len is at most 19
        (self.tag_len() * 8) as u32
    }

    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Low => '1',
            Self::Medium => '2',
            Self::High => '3',
            Self::QuantumResistant => '4',
        }
    }

    #[must_use]
    pub const fn from_marker(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Low),
            '2' => Some(Self::Medium),
            '3' => Some(Self::High),
            '4' => Some(Self::QuantumResistant),
            _ => None,
        }
    }

    /// Strongest profile usable with a key of `len` bytes.
    #[must_use]
    pub const fn for_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Medium),
            24 => Some(Self::High),
            32 => Some(Self::QuantumResistant),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::QuantumResistant => "quantum-resistant",
        }
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityProfile {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s) || (s.len() == 1 && s.starts_with(p.marker())))
            .ok_or(TicketError::Format("unknown security profile"))
    }
}

/// Decoded plaintext of a ticket block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketFields {
    pub item: Item,
    /// Raw category byte; may exceed 225 in a forged block.
    pub category: u8,
    pub timestamp: Timestamp,
    pub tag: Vec<u8>,
}

/// How much a successful open can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// The tag was recomputed with the salt and matched.
    Authenticated,
    /// No salt was available; only the structure was checked.
    StructuralOnly,
}
