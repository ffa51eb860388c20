//! End-to-end integration tests for FSG tickets
//!
//! This crate provides a harness that stands up a ticket service over an
//! on-disk seed directory, the way a deployment would.

#![forbid(unsafe_code)]
#![deny(warnings)]

use std::path::Path;

use fsg_tickets::{
    pack_seed_file, seedfile::seed_file_name, seedfile::write_seed_file, Item, RateLimitConfig,
    SecurityProfile, TicketConfig, TicketError, TicketService,
};
use tempfile::TempDir;

/// Salt used by the golden vectors.
pub const GOLDEN_SALT: &[u8] = b"fsg-conformance-salt-0123456789ab";

/// Key of the golden vectors: bytes `0..key_len`.
#[must_use]
pub fn golden_key(profile: SecurityProfile) -> Vec<u8> {
    (0..=u8::MAX).take(profile.key_len()).collect()
}

/// One line of `tests/golden/ticket_vectors.tsv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenVector {
    pub profile: SecurityProfile,
    pub item: Item,
    pub category: u8,
    pub timestamp: u32,
    pub ticket: String,
}

/// Parse the golden vector table, skipping `#` comments.
///
/// # Errors
///
/// `Format` on a malformed line.
pub fn parse_golden(text: &str) -> Result<Vec<GoldenVector>, TicketError> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let cols: Vec<&str> = l.split('\t').collect();
            let [profile, item, category, timestamp, ticket] = cols[..] else {
                return Err(TicketError::Format("golden line needs five columns"));
            };
            Ok(GoldenVector {
                profile: profile.parse()?,
                item: item.parse()?,
                category: category.parse().map_err(|_| TicketError::Format("bad golden category"))?,
                timestamp: timestamp.parse().map_err(|_| TicketError::Format("bad golden timestamp"))?,
                ticket: ticket.to_owned(),
            })
        })
        .collect()
}

/// A seed directory plus the service built over it.
pub struct Harness {
    pub dir: TempDir,
    pub service: TicketService<String>,
}

impl Harness {
    /// Write one seed file per `(category, items)` and start a service with
    /// no rate limits or throttling.
    ///
    /// # Errors
    ///
    /// Any error from writing the files or building the service.
    pub fn new(profile: SecurityProfile, categories: &[(u8, &[i64])]) -> Result<Self, TicketError> {
        Self::with_limits(profile, categories, RateLimitConfig::unlimited())
    }

    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn with_limits(
        profile: SecurityProfile,
        categories: &[(u8, &[i64])],
        rate_limit: RateLimitConfig,
    ) -> Result<Self, TicketError> {
        let config = TicketConfig { profile, rate_limit, enforce_throttle: false, ..TicketConfig::default() };
        Self::with_config(categories, config)
    }

    /// Service over the written seed directory with `config` as given, apart
    /// from `seed_dir`.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn with_config(categories: &[(u8, &[i64])], mut config: TicketConfig) -> Result<Self, TicketError> {
        let dir = tempfile::tempdir()?;
        for (number, seeds) in categories {
            write_category(dir.path(), *number, seeds)?;
        }
        config.seed_dir = Some(dir.path().to_path_buf());
        let service = TicketService::from_config(config)?;
        Ok(Self { dir, service })
    }
}

fn write_category(dir: &Path, number: u8, seeds: &[i64]) -> Result<(), TicketError> {
    let items: Vec<Item> = seeds.iter().copied().map(Item::from_i64).collect();
    let packed = pack_seed_file(
        &format!("https://seeds.example/{number}"),
        &format!("Category {number}"),
        &items,
        true,
    )?;
    write_seed_file(&dir.join(seed_file_name(number)), &packed)
}
