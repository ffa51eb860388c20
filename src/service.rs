use std::{fmt, hash::Hash, sync::Arc};

use crate::{
    catalog::{CatalogLoader, SeedCatalog},
    clock::TicketClock,
    config::TicketConfig,
    errors::TicketError,
    issuer::{IssueOptions, IssuedTicket, TicketIssuer},
    keys::KeyMaterial,
    rate_limit::RateLimiter,
    seedfile::SeedDirLoader,
    throttle::{ThrottleGate, ThrottlePolicy},
    types::{CategoryNumber, Item, Timestamp},
    verifier::{TicketVerifier, VerificationResult},
};

/// Issuer and verifier sharing one key generation, catalog and rate limiter.
pub struct TicketService<K> {
    config: TicketConfig,
    keys: Arc<KeyMaterial>,
    catalog: Arc<SeedCatalog>,
    limiter: Arc<RateLimiter<K>>,
    clock: Arc<TicketClock>,
    issuer: TicketIssuer<K>,
    verifier: TicketVerifier<K>,
    throttle: ThrottlePolicy,
    gate: Arc<ThrottleGate>,
}

impl<K> fmt::Debug for TicketService<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketService")
            .field("keys", &self.keys)
            .field("categories", &self.catalog.len())
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> TicketService<K> {
    /// # Errors
    ///
    /// Any configuration error, or `CatalogEmpty` when no category has items.
    pub fn new(config: TicketConfig, catalog: SeedCatalog) -> Result<Self, TicketError> {
        config.validate()?;
        if catalog.total_items() == 0 {
            return Err(TicketError::CatalogEmpty);
        }
        let keys = Arc::new(config.key_material()?);
        let catalog = Arc::new(catalog);
        let limiter = Arc::new(RateLimiter::try_new(config.rate_limit.clone())?);
        let clock = Arc::new(TicketClock::system());
        let windows = config.windows()?;
        let throttle = ThrottlePolicy::derive(
            config.ld50(),
            catalog.largest_category(),
            windows.dead(),
            config.profile,
            config.forge_success,
        )?;
        let gate = Arc::new(if config.enforce_throttle {
            ThrottleGate::for_catalog(&catalog, config.ld50(), windows.dead(), config.profile, config.forge_success)?
        } else {
            ThrottleGate::open()
        });

        let issuer = TicketIssuer::with_clock(
            Arc::clone(&keys),
            Arc::clone(&catalog),
            Arc::clone(&limiter),
            config.profile,
            Arc::clone(&clock),
        )?
        .with_throttle(Arc::clone(&gate));
        let verifier = TicketVerifier::new(
            Arc::clone(&keys),
            Some(Arc::clone(&catalog)),
            Arc::clone(&limiter),
            windows,
        )
        .with_throttle(Arc::clone(&gate));

        tracing::info!(
            profile = %config.profile,
            live_secs = config.live_secs,
            dead_secs = config.dead_secs,
            categories = catalog.len(),
            items = catalog.total_items(),
            "ticket service ready"
        );
        tracing::info!(
            issue_interval = ?throttle.issue_interval,
            verify_interval = ?throttle.verify_interval,
            enforced = config.enforce_throttle,
            "derived throttle intervals"
        );
        Ok(Self { config, keys, catalog, limiter, clock, issuer, verifier, throttle, gate })
    }

    /// Load the catalog from `loader`, then build the service.
    ///
    /// # Errors
    ///
    /// Loader errors, then as [`new`](Self::new).
    pub fn from_loader(config: TicketConfig, loader: &dyn CatalogLoader) -> Result<Self, TicketError> {
        let catalog = loader.load()?;
        Self::new(config, catalog)
    }

    /// Load the catalog from `config.seed_dir`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when no seed directory is configured.
    pub fn from_config(config: TicketConfig) -> Result<Self, TicketError> {
        let dir = config
            .seed_dir
            .clone()
            .ok_or_else(|| TicketError::InvalidConfig("seed_dir is not set".into()))?;
        Self::from_loader(config, &SeedDirLoader::new(dir))
    }

    /// Ticket for a random seed from any non-empty category.
    ///
    /// With `enforce_throttle` set, a second ticket from the same category
    /// inside its issue interval is refused with `Throttled`.
    ///
    /// # Errors
    ///
    /// As [`TicketIssuer::issue_with`].
    pub fn issue(&self, identity: &K) -> Result<IssuedTicket, TicketError> {
        self.issuer.issue(identity)
    }

    /// Ticket for a random seed from the category at `locator`.
    ///
    /// # Errors
    ///
    /// `CategoryNotFound` for an unknown locator, otherwise as
    /// [`TicketIssuer::issue_with`].
    pub fn issue_in(&self, identity: &K, locator: &str) -> Result<IssuedTicket, TicketError> {
        let record = self
            .catalog
            .by_locator(locator)
            .ok_or_else(|| TicketError::CategoryNotFound(locator.to_owned()))?;
        let opts = IssueOptions { category: Some(record.number()), ..IssueOptions::default() };
        self.issuer.issue_with(identity, opts)
    }

    /// Verifications closer together than the verify interval are rejected
    /// as `RateLimitExceeded` when the throttle is enforced.
    pub fn verify(
        &self,
        identity: &K,
        ticket: &str,
        claimed_item: Item,
        claimed_category: Option<CategoryNumber>,
        now: Timestamp,
    ) -> VerificationResult {
        self.verifier.verify(identity, ticket, claimed_item, claimed_category, now)
    }

    pub fn verify_now(
        &self,
        identity: &K,
        ticket: &str,
        claimed_item: Item,
        claimed_category: Option<CategoryNumber>,
    ) -> VerificationResult {
        self.verifier.verify_now(identity, ticket, claimed_item, claimed_category)
    }

    /// Switch to a fresh key and salt. Outstanding tickets stop verifying.
    ///
    /// Returns the new generation.
    ///
    /// # Errors
    ///
    /// `Entropy`.
    pub fn rotate_keys(&mut self) -> Result<u32, TicketError> {
        let keys = Arc::new(self.keys.rotate()?);
        self.issuer = TicketIssuer::with_clock(
            Arc::clone(&keys),
            Arc::clone(&self.catalog),
            Arc::clone(&self.limiter),
            self.config.profile,
            Arc::clone(&self.clock),
        )?
        .with_throttle(Arc::clone(&self.gate));
        self.verifier = TicketVerifier::new(
            Arc::clone(&keys),
            Some(Arc::clone(&self.catalog)),
            Arc::clone(&self.limiter),
            *self.verifier.windows(),
        )
        .with_throttle(Arc::clone(&self.gate));
        self.keys = keys;
        Ok(self.keys.generation())
    }

    #[must_use]
    pub const fn throttle(&self) -> ThrottlePolicy {
        self.throttle
    }

    #[must_use]
    pub fn gate(&self) -> &ThrottleGate {
        &self.gate
    }

    #[must_use]
    pub fn catalog(&self) -> &SeedCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    #[must_use]
    pub const fn config(&self) -> &TicketConfig {
        &self.config
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter<K> {
        &self.limiter
    }
}
