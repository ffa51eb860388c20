use std::{fmt, hash::Hash, sync::Arc, time::SystemTime};

use rand_core::OsRng;

use crate::{
    catalog::SeedCatalog,
    clock::{SystemClock, TicketClock, TimeSource},
    errors::TicketError,
    keys::KeyMaterial,
    rate_limit::{Action, RateLimiter},
    throttle::ThrottleGate,
    ticket::seal_ticket,
    types::{CategoryNumber, Item, SecurityProfile, Timestamp},
};

/// Per-request overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueOptions {
    /// Profile to seal with; defaults to the issuer's.
    pub profile: Option<SecurityProfile>,
    /// Restrict the draw to one category.
    pub category: Option<CategoryNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTicket {
    pub ticket: String,
    pub item: Item,
    pub category: CategoryNumber,
    pub locator: String,
    pub display_name: String,
    pub timestamp: Timestamp,
    pub profile: SecurityProfile,
}

impl IssuedTicket {
    #[must_use]
    pub fn issued_at(&self) -> SystemTime {
        self.timestamp.to_system_time()
    }
}

/// Draws a seed and seals it into a ticket.
///
/// Every ticket from one issuer carries a distinct timestamp.
pub struct TicketIssuer<K, S = SystemClock> {
    keys: Arc<KeyMaterial>,
    catalog: Arc<SeedCatalog>,
    limiter: Arc<RateLimiter<K>>,
    clock: Arc<TicketClock<S>>,
    throttle: Option<Arc<ThrottleGate>>,
    profile: SecurityProfile,
}

impl<K, S> fmt::Debug for TicketIssuer<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketIssuer")
            .field("keys", &self.keys)
            .field("categories", &self.catalog.len())
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> TicketIssuer<K, SystemClock> {
    /// # Errors
    ///
    /// `MissingSalt` or `ProfileKeyMismatch`.
    pub fn new(
        keys: Arc<KeyMaterial>,
        catalog: Arc<SeedCatalog>,
        limiter: Arc<RateLimiter<K>>,
        profile: SecurityProfile,
    ) -> Result<Self, TicketError> {
        Self::with_clock(keys, catalog, limiter, profile, Arc::new(TicketClock::system()))
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug, S: TimeSource> TicketIssuer<K, S> {
    /// # Errors
    ///
    /// `MissingSalt` for verify-only keys, `ProfileKeyMismatch` when the key
    /// does not fit `profile`.
    pub fn with_clock(
        keys: Arc<KeyMaterial>,
        catalog: Arc<SeedCatalog>,
        limiter: Arc<RateLimiter<K>>,
        profile: SecurityProfile,
        clock: Arc<TicketClock<S>>,
    ) -> Result<Self, TicketError> {
        if keys.salt().is_none() {
            return Err(TicketError::MissingSalt);
        }
        keys.check_profile(profile)?;
        Ok(Self { keys, catalog, limiter, clock, throttle: None, profile })
    }

    /// Pace issuance per category through `gate`.
    #[must_use]
    pub fn with_throttle(mut self, gate: Arc<ThrottleGate>) -> Self {
        self.throttle = Some(gate);
        self
    }

    /// # Errors
    ///
    /// See [`issue_with`](Self::issue_with).
    pub fn issue(&self, identity: &K) -> Result<IssuedTicket, TicketError> {
        self.issue_with(identity, IssueOptions::default())
    }

    /// Rate-limit, draw a seed, pass the category's throttle, take the next
    /// timestamp and seal.
    ///
    /// If the wall clock has stepped back since the last ticket, the
    /// timestamp is the last one plus a unit and so lies ahead of wall time.
    /// Such a ticket classifies as invalid until the wall clock catches up.
    ///
    /// # Errors
    ///
    /// `RateLimitExceeded`, `Throttled`, `ProfileKeyMismatch`, `CatalogEmpty`,
    /// `CategoryNotFound`, `ClockOutOfRange` or `Entropy`.
    pub fn issue_with(&self, identity: &K, opts: IssueOptions) -> Result<IssuedTicket, TicketError> {
        self.limiter.check(identity, Action::Issue)?;
        let profile = opts.profile.unwrap_or(self.profile);
        self.keys.check_profile(profile)?;

        let (item, category) = match opts.category {
            Some(c) => self.catalog.pick_in(c.get(), &mut OsRng)?,
            None => self.catalog.pick_random(&mut OsRng)?,
        };
        if let Some(gate) = &self.throttle {
            gate.admit_issue(category.get())?;
        }
        let record = self.catalog.lookup(category.get())?;
        let timestamp = self.clock.next_timestamp()?;
        let ticket = seal_ticket(&self.keys, profile, item, category.get(), timestamp)?;

        tracing::info!(
            %ticket,
            seed = %item,
            category = category.get(),
            timestamp = timestamp.units(),
            %profile,
            "created ticket"
        );
        Ok(IssuedTicket {
            ticket,
            item,
            category,
            locator: record.locator().to_owned(),
            display_name: record.display_name().to_owned(),
            timestamp,
            profile,
        })
    }

    #[must_use]
    pub const fn profile(&self) -> SecurityProfile {
        self.profile
    }

    #[must_use]
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<TicketClock<S>> {
        &self.clock
    }
}
