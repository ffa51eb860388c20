use std::{fmt, hash::Hash, sync::Arc};

use crate::{
    catalog::SeedCatalog,
    errors::VerifyFailure,
    keys::KeyMaterial,
    rate_limit::{Action, RateLimiter},
    throttle::ThrottleGate,
    ticket::{classify_period, open_ticket, PeriodWindows},
    types::{CategoryNumber, Confidence, Item, Period, SecurityProfile, Timestamp},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Authenticated and usable.
    Valid,
    /// Usable as far as could be checked without the salt.
    StructuralOnly,
    Rejected,
}

/// What a verified ticket contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTicket {
    pub item: Item,
    pub category: u8,
    pub timestamp: Timestamp,
    pub profile: SecurityProfile,
    /// Whether seed membership was checked against a catalog.
    pub catalog_checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub verdict: Verdict,
    pub period: Period,
    pub failure: Option<VerifyFailure>,
    pub ticket: Option<VerifiedTicket>,
}

impl VerificationResult {
    #[must_use]
    pub const fn rejected(failure: VerifyFailure) -> Self {
        Self { verdict: Verdict::Rejected, period: Period::Invalid, failure: Some(failure), ticket: None }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Valid)
    }

    /// Valid or structurally plausible.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Valid | Verdict::StructuralOnly)
    }
}

/// Checks tickets against claimed seeds and the time windows.
pub struct TicketVerifier<K> {
    keys: Arc<KeyMaterial>,
    catalog: Option<Arc<SeedCatalog>>,
    limiter: Arc<RateLimiter<K>>,
    throttle: Option<Arc<ThrottleGate>>,
    windows: PeriodWindows,
}

impl<K> fmt::Debug for TicketVerifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketVerifier")
            .field("keys", &self.keys)
            .field("catalog", &self.catalog.as_ref().map(|c| c.len()))
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> TicketVerifier<K> {
    /// Without a catalog, seed membership is not checked.
    #[must_use]
    pub const fn new(
        keys: Arc<KeyMaterial>,
        catalog: Option<Arc<SeedCatalog>>,
        limiter: Arc<RateLimiter<K>>,
        windows: PeriodWindows,
    ) -> Self {
        Self { keys, catalog, limiter, throttle: None, windows }
    }

    /// Space verifications by the gate's verify interval.
    #[must_use]
    pub fn with_throttle(mut self, gate: Arc<ThrottleGate>) -> Self {
        self.throttle = Some(gate);
        self
    }

    /// Verify `ticket` for a client claiming `claimed_item` (and optionally a
    /// category) at time `now`.
    ///
    /// Rejections carry a [`VerifyFailure`]; nothing more about the ticket is
    /// revealed.
    pub fn verify(
        &self,
        identity: &K,
        ticket: &str,
        claimed_item: Item,
        claimed_category: Option<CategoryNumber>,
        now: Timestamp,
    ) -> VerificationResult {
        match self.check(identity, ticket, claimed_item, claimed_category, now) {
            Ok(result) => {
                tracing::info!(
                    ticket,
                    seed = %claimed_item,
                    period = %result.period,
                    verdict = ?result.verdict,
                    "ticket verified"
                );
                result
            }
            Err(failure) => {
                tracing::info!(ticket, seed = %claimed_item, %failure, "ticket rejected");
                VerificationResult::rejected(failure)
            }
        }
    }

    /// [`verify`](Self::verify) at the current system time.
    pub fn verify_now(
        &self,
        identity: &K,
        ticket: &str,
        claimed_item: Item,
        claimed_category: Option<CategoryNumber>,
    ) -> VerificationResult {
        match Timestamp::now() {
            Ok(now) => self.verify(identity, ticket, claimed_item, claimed_category, now),
            Err(e) => {
                tracing::error!(error = %e, "system clock outside the ticket range");
                VerificationResult::rejected(VerifyFailure::PeriodInvalid)
            }
        }
    }

    fn check(
        &self,
        identity: &K,
        ticket: &str,
        claimed_item: Item,
        claimed_category: Option<CategoryNumber>,
        now: Timestamp,
    ) -> Result<VerificationResult, VerifyFailure> {
        self.limiter
            .check(identity, Action::Verify)
            .map_err(|_| VerifyFailure::RateLimitExceeded)?;
        if let Some(gate) = &self.throttle {
            gate.admit_verify().map_err(|_| VerifyFailure::RateLimitExceeded)?;
        }

        let opened = open_ticket(&self.keys, ticket)?;
        let fields = &opened.fields;
        if fields.item != claimed_item {
            return Err(VerifyFailure::SeedMismatch);
        }
        if claimed_category.is_some_and(|c| c.get() != fields.category) {
            return Err(VerifyFailure::CategoryMismatch);
        }
        let catalog_checked = match &self.catalog {
            Some(catalog) if !catalog.contains(fields.category, &fields.item) => {
                return Err(VerifyFailure::CategoryMismatch);
            }
            Some(_) => true,
            None => false,
        };

        let period = classify_period(fields.timestamp, now, &self.windows);
        if period == Period::Invalid {
            return Err(VerifyFailure::PeriodInvalid);
        }
        let verdict = match opened.confidence {
            Confidence::Authenticated => Verdict::Valid,
            Confidence::StructuralOnly => Verdict::StructuralOnly,
        };
        Ok(VerificationResult {
            verdict,
            period,
            failure: None,
            ticket: Some(VerifiedTicket {
                item: fields.item,
                category: fields.category,
                timestamp: fields.timestamp,
                profile: opened.profile,
                catalog_checked,
            }),
        })
    }

    #[must_use]
    pub const fn windows(&self) -> &PeriodWindows {
        &self.windows
    }

    #[must_use]
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use std::time::Duration;

    use super::*;
    use crate::{catalog::CategoryRecord, rate_limit::RateLimitConfig, ticket::seal_ticket};

    const TS: Timestamp = Timestamp(2_000_000);

    fn keys() -> Arc<KeyMaterial> {
        Arc::new(
            KeyMaterial::initialize(SecurityProfile::High, Some(vec![9; 24]), Some(vec![8; 40])).unwrap(),
        )
    }

    fn catalog() -> Arc<SeedCatalog> {
        Arc::new(
            SeedCatalog::new(vec![CategoryRecord::new(3, "loc", "Three", vec![Item::from_i64(77)]).unwrap()])
                .unwrap(),
        )
    }

    fn verifier(keys: Arc<KeyMaterial>, catalog: Option<Arc<SeedCatalog>>) -> TicketVerifier<u8> {
        TicketVerifier::new(
            keys,
            catalog,
            Arc::new(RateLimiter::new(RateLimitConfig::unlimited())),
            PeriodWindows::default(),
        )
    }

    fn ticket(keys: &KeyMaterial, item: i64, category: u8) -> String {
        seal_ticket(keys, SecurityProfile::High, Item::from_i64(item), category, TS).unwrap()
    }

    #[test]
    fn live_then_dead_then_invalid() {
        let k = keys();
        let v = verifier(Arc::clone(&k), Some(catalog()));
        let t = ticket(&k, 77, 3);
        let at = |d: u32| Timestamp(TS.0 + d);

        let live = v.verify(&0, &t, Item::from_i64(77), None, at(10));
        assert_eq!((live.verdict, live.period), (Verdict::Valid, Period::Live));
        assert!(live.ticket.as_ref().unwrap().catalog_checked);

        let dead = v.verify(&0, &t, Item::from_i64(77), None, at(57_600));
        assert_eq!((dead.verdict, dead.period), (Verdict::Valid, Period::Dead));

        let gone = v.verify(&0, &t, Item::from_i64(77), None, at(9_676_800));
        assert_eq!(gone.failure, Some(VerifyFailure::PeriodInvalid));
        assert_eq!(gone.period, Period::Invalid);

        let early = v.verify(&0, &t, Item::from_i64(77), None, Timestamp(TS.0 - 1));
        assert_eq!(early.failure, Some(VerifyFailure::PeriodInvalid));
    }

    #[test]
    fn claims_must_match() {
        let k = keys();
        let v = verifier(Arc::clone(&k), Some(catalog()));
        let t = ticket(&k, 77, 3);
        let r = v.verify(&0, &t, Item::from_i64(78), None, TS);
        assert_eq!(r.failure, Some(VerifyFailure::SeedMismatch));
        let r = v.verify(&0, &t, Item::from_i64(77), Some(CategoryNumber::new(4).unwrap()), TS);
        assert_eq!(r.failure, Some(VerifyFailure::CategoryMismatch));
        let r = v.verify(&0, &t, Item::from_i64(77), Some(CategoryNumber::new(3).unwrap()), TS);
        assert!(r.is_valid());
    }

    #[test]
    fn catalog_membership_is_enforced_when_present() {
        let k = keys();
        let t = ticket(&k, 12, 3);
        let with = verifier(Arc::clone(&k), Some(catalog()));
        assert_eq!(
            with.verify(&0, &t, Item::from_i64(12), None, TS).failure,
            Some(VerifyFailure::CategoryMismatch)
        );
        let without = verifier(Arc::clone(&k), None);
        let r = without.verify(&0, &t, Item::from_i64(12), None, TS);
        assert!(r.is_valid());
        assert!(!r.ticket.unwrap().catalog_checked);
    }

    #[test]
    fn tampering_is_detected() {
        let k = keys();
        let v = verifier(Arc::clone(&k), None);
        let t = ticket(&k, 77, 3);
        let last = t.chars().last().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        let tampered = format!("{}{flipped}", &t[..t.len() - 1]);
        let r = v.verify(&0, &tampered, Item::from_i64(77), None, TS);
        assert!(matches!(
            r.failure,
            Some(VerifyFailure::Authentication | VerifyFailure::SeedMismatch)
        ));
        assert_eq!(r.verdict, Verdict::Rejected);
        assert!(r.ticket.is_none());
    }

    #[test]
    fn salt_less_verification_is_structural() {
        let k = keys();
        let t = ticket(&k, 77, 3);
        let ro = Arc::new(KeyMaterial::verify_only(SecurityProfile::High, k.cipher_key().to_vec()).unwrap());
        let r = verifier(ro, None).verify(&0, &t, Item::from_i64(77), None, TS);
        assert_eq!(r.verdict, Verdict::StructuralOnly);
        assert!(r.is_accepted());
        assert!(!r.is_valid());
    }

    #[test]
    fn rate_limit_is_checked_first() {
        let k = keys();
        let mut limits = RateLimitConfig::default();
        limits.verify.max_requests = 1;
        let v = TicketVerifier::new(
            Arc::clone(&k),
            None,
            Arc::new(RateLimiter::new(limits)),
            PeriodWindows::default(),
        );
        let t = ticket(&k, 77, 3);
        assert!(v.verify(&1u8, &t, Item::from_i64(77), None, TS).is_valid());
        assert_eq!(
            v.verify(&1u8, &t, Item::from_i64(77), None, TS).failure,
            Some(VerifyFailure::RateLimitExceeded)
        );
        assert!(v.verify(&2u8, "junk", Item::from_i64(77), None, TS).failure == Some(VerifyFailure::Decode));
    }

    #[test]
    fn short_tags_pace_verification() {
        let k = Arc::new(
            KeyMaterial::initialize(SecurityProfile::Low, Some(vec![9; 16]), Some(vec![8; 40])).unwrap(),
        );
        let gate = ThrottleGate::for_catalog(
            &catalog(),
            Duration::from_secs(86_400),
            Duration::from_secs(14 * 86_400),
            SecurityProfile::Low,
            0.001,
        )
        .unwrap();
        let v = verifier(Arc::clone(&k), None).with_throttle(Arc::new(gate));
        let t = seal_ticket(&k, SecurityProfile::Low, Item::from_i64(77), 3, TS).unwrap();
        assert!(v.verify(&1, &t, Item::from_i64(77), None, TS).is_valid());
        // The pace is shared by every client
        let r = v.verify(&2, &t, Item::from_i64(77), None, TS);
        assert_eq!(r.failure, Some(VerifyFailure::RateLimitExceeded));
        assert!(r.ticket.is_none());
    }
}
