//! Throttle intervals that keep seed enumeration and tag forging slow.
//!
//! Issuing one ticket every `issue_interval` from a pool of `n` seeds means a
//! caller collecting tickets needs `ld50` before they have a 50% chance of
//! having seen a given seed. Verifying one ticket every `verify_interval`
//! bounds the chance of forging a tag within a ticket's dead window to
//! `forge_success`.
//!
//! [`ThrottleGate`] enforces those intervals: issuance is paced per category,
//! verification globally. A request arriving early is refused, not delayed.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{catalog::SeedCatalog, errors::TicketError, rate_limit::Action, types::SecurityProfile};

fn secs(x: f64) -> Duration {
    Duration::try_from_secs_f64(x).unwrap_or(Duration::MAX)
}

/// `ld50 * ln(1 - 1/n) / ln(0.5)`; zero for pools of at most one seed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn issue_interval(ld50: Duration, pool_size: usize) -> Duration {
    if pool_size <= 1 {
        return Duration::ZERO;
    }
    let n = pool_size as f64;
    secs(ld50.as_secs_f64() * (-1.0 / n).ln_1p() / 0.5f64.ln())
}

/// `dead * ln(1 - 2^-bits) / ln(1 - forge_success)`.
///
/// # Errors
///
/// `InvalidConfig` unless `0 < forge_success < 1`.
pub fn verify_interval(dead: Duration, tag_bits: u32, forge_success: f64) -> Result<Duration, TicketError> {
    if !(forge_success > 0.0 && forge_success < 1.0) {
        return Err(TicketError::InvalidConfig(format!(
            "forge_success must be in (0, 1), got {forge_success}"
        )));
    }
    let bits = i32::try_from(tag_bits).unwrap_or(i32::MAX);
    let p = 2f64.powi(-bits);
    Ok(secs(dead.as_secs_f64() * (-p).ln_1p() / (-forge_success).ln_1p()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottlePolicy {
    pub issue_interval: Duration,
    pub verify_interval: Duration,
}

impl ThrottlePolicy {
    /// # Errors
    ///
    /// `InvalidConfig` for an out-of-range `forge_success`.
    pub fn derive(
        ld50: Duration,
        pool_size: usize,
        dead: Duration,
        profile: SecurityProfile,
        forge_success: f64,
    ) -> Result<Self, TicketError> {
        Ok(Self {
            issue_interval: issue_interval(ld50, pool_size),
            verify_interval: verify_interval(dead, profile.tag_bits(), forge_success)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Pace {
    Issue(u8),
    Verify,
}

/// Last admitted request per pace, refusing anything that comes sooner than
/// its interval allows.
#[derive(Debug, Default)]
pub struct ThrottleGate {
    issue: HashMap<u8, Duration>,
    verify: Duration,
    last: DashMap<Pace, Instant>,
}

impl ThrottleGate {
    /// Gate that admits everything.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// One issue interval per category from its pool size, one verify
    /// interval from the profile's tag size.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an out-of-range `forge_success`.
    pub fn for_catalog(
        catalog: &SeedCatalog,
        ld50: Duration,
        dead: Duration,
        profile: SecurityProfile,
        forge_success: f64,
    ) -> Result<Self, TicketError> {
        let issue = catalog
            .records()
            .map(|r| (r.number().get(), issue_interval(ld50, r.items().len())))
            .collect();
        Ok(Self {
            issue,
            verify: verify_interval(dead, profile.tag_bits(), forge_success)?,
            last: DashMap::new(),
        })
    }

    #[must_use]
    pub fn issue_interval(&self, category: u8) -> Duration {
        self.issue.get(&category).copied().unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub const fn verify_interval(&self) -> Duration {
        self.verify
    }

    /// # Errors
    ///
    /// `Throttled` when the last ticket for `category` was issued less than
    /// its interval ago.
    pub fn admit_issue(&self, category: u8) -> Result<(), TicketError> {
        self.admit_issue_at(category, Instant::now())
    }

    /// # Errors
    ///
    /// As [`admit_issue`](Self::admit_issue).
    pub fn admit_issue_at(&self, category: u8, now: Instant) -> Result<(), TicketError> {
        self.admit(Pace::Issue(category), self.issue_interval(category), now)
    }

    /// # Errors
    ///
    /// `Throttled` when the last verification was less than the verify
    /// interval ago.
    pub fn admit_verify(&self) -> Result<(), TicketError> {
        self.admit_verify_at(Instant::now())
    }

    /// # Errors
    ///
    /// As [`admit_verify`](Self::admit_verify).
    pub fn admit_verify_at(&self, now: Instant) -> Result<(), TicketError> {
        self.admit(Pace::Verify, self.verify, now)
    }

    fn admit(&self, pace: Pace, interval: Duration, now: Instant) -> Result<(), TicketError> {
        if interval.is_zero() {
            return Ok(());
        }
        match self.last.entry(pace) {
            Entry::Occupied(mut e) => {
                let since = now.saturating_duration_since(*e.get());
                if since < interval {
                    let action = match pace {
                        Pace::Issue(_) => Action::Issue,
                        Pace::Verify => Action::Verify,
                    };
                    let retry_after = interval - since;
                    tracing::warn!(%action, ?pace, ?retry_after, "request throttled");
                    return Err(TicketError::Throttled { action, retry_after });
                }
                e.insert(now);
            }
            Entry::Vacant(e) => {
                e.insert(now);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{catalog::CategoryRecord, types::Item};

    const DAY: u64 = 24 * 60 * 60;

    #[test]
    fn two_seed_pool_needs_one_ld50() {
        let d = issue_interval(Duration::from_secs(1000), 2);
        assert!((d.as_secs_f64() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn larger_pools_allow_faster_issuance() {
        let ld50 = Duration::from_secs(31 * DAY);
        let small = issue_interval(ld50, 10);
        let large = issue_interval(ld50, 10_000);
        assert!(large < small);
        // roughly ld50 / (n ln 2) for large n
        let approx = ld50.as_secs_f64() / (10_000.0 * 2f64.ln());
        assert!((large.as_secs_f64() - approx).abs() / approx < 1e-3);
        assert_eq!(issue_interval(ld50, 1), Duration::ZERO);
        assert_eq!(issue_interval(ld50, 0), Duration::ZERO);
    }

    #[test]
    fn long_tags_need_almost_no_verify_throttle() {
        let dead = Duration::from_secs(14 * DAY);
        let short = verify_interval(dead, 24, 0.01).unwrap();
        let long = verify_interval(dead, 152, 0.01).unwrap();
        assert!(short > Duration::from_millis(1));
        assert!(long < Duration::from_nanos(1));
    }

    #[test]
    fn forge_success_must_be_a_probability() {
        for bad in [0.0, 1.0, -0.5, 2.0, f64::NAN] {
            assert!(verify_interval(Duration::from_secs(1), 24, bad).is_err());
        }
    }

    #[test]
    fn policy_uses_profile_tag_size() {
        let p = ThrottlePolicy::derive(
            Duration::from_secs(31 * DAY),
            1000,
            Duration::from_secs(14 * DAY),
            SecurityProfile::Low,
            0.01,
        )
        .unwrap();
        assert_eq!(
            p.verify_interval,
            verify_interval(Duration::from_secs(14 * DAY), 24, 0.01).unwrap()
        );
    }

    fn two_categories() -> SeedCatalog {
        SeedCatalog::new(vec![
            CategoryRecord::new(1, "a", "A", vec![Item::from_i64(1), Item::from_i64(2)]).unwrap(),
            CategoryRecord::new(2, "b", "B", vec![Item::from_i64(3)]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn second_issue_inside_interval_is_refused() {
        let gate = ThrottleGate::for_catalog(
            &two_categories(),
            Duration::from_secs(1000),
            Duration::from_secs(14 * DAY),
            SecurityProfile::QuantumResistant,
            0.001,
        )
        .unwrap();
        let t0 = Instant::now();
        assert!(gate.admit_issue_at(1, t0).is_ok());
        let err = gate.admit_issue_at(1, t0 + Duration::from_secs(10)).unwrap_err();
        match err {
            TicketError::Throttled { action, retry_after } => {
                assert_eq!(action, Action::Issue);
                assert!((retry_after.as_secs_f64() - 990.0).abs() < 1e-3);
            }
            other => panic!("unexpected error {other}"),
        }
        // A refused request does not push the window forward
        assert!(gate.admit_issue_at(1, t0 + Duration::from_secs(1001)).is_ok());
        // Single-seed categories are not paced; neither are unknown ones
        assert!(gate.admit_issue_at(2, t0).is_ok());
        assert!(gate.admit_issue_at(2, t0).is_ok());
        assert!(gate.admit_issue_at(9, t0).is_ok());
    }

    #[test]
    fn verification_is_paced_globally() {
        let gate = ThrottleGate::for_catalog(
            &two_categories(),
            Duration::from_secs(DAY),
            Duration::from_secs(14 * DAY),
            SecurityProfile::Low,
            0.001,
        )
        .unwrap();
        let interval = gate.verify_interval();
        assert!(interval > Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(gate.admit_verify_at(t0).is_ok());
        assert!(matches!(
            gate.admit_verify_at(t0 + interval / 2),
            Err(TicketError::Throttled { action: Action::Verify, .. })
        ));
        assert!(gate.admit_verify_at(t0 + interval).is_ok());
    }

    #[test]
    fn open_gate_admits_everything() {
        let gate = ThrottleGate::open();
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(gate.admit_issue_at(1, t0).is_ok());
            assert!(gate.admit_verify_at(t0).is_ok());
        }
    }
}
