use std::collections::{BTreeMap, HashSet};

use rand_core::RngCore;

use crate::{
    errors::TicketError,
    types::{CategoryNumber, Item},
};

/// One category of seeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    number: CategoryNumber,
    locator: String,
    display_name: String,
    items: Vec<Item>,
}

impl CategoryRecord {
    /// Items are sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// `CategoryOutOfRange` when `number > 225`.
    pub fn new(
        number: u16,
        locator: impl Into<String>,
        display_name: impl Into<String>,
        mut items: Vec<Item>,
    ) -> Result<Self, TicketError> {
        let number = CategoryNumber::new(number)?;
        items.sort_unstable();
        items.dedup();
        Ok(Self { number, locator: locator.into(), display_name: display_name.into(), items })
    }

    #[must_use]
    pub const fn number(&self) -> CategoryNumber {
        self.number
    }

    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, item: &Item) -> bool {
        self.items.binary_search(item).is_ok()
    }
}

/// Source of a [`SeedCatalog`], e.g. a directory of seed files.
pub trait CatalogLoader {
    /// # Errors
    ///
    /// Whatever the source fails with, plus catalog validation errors.
    fn load(&self) -> Result<SeedCatalog, TicketError>;
}

/// Immutable set of categories keyed by number.
#[derive(Debug, Clone, Default)]
pub struct SeedCatalog {
    records: BTreeMap<u8, CategoryRecord>,
    // categories with at least one item, ascending
    eligible: Vec<u8>,
}

impl SeedCatalog {
    /// # Errors
    ///
    /// `DuplicateCategory` or `DuplicateLocator`.
    pub fn new(records: impl IntoIterator<Item = CategoryRecord>) -> Result<Self, TicketError> {
        let mut map = BTreeMap::new();
        let mut locators = HashSet::new();
        for record in records {
            if !locators.insert(record.locator.clone()) {
                return Err(TicketError::DuplicateLocator(record.locator));
            }
            let n = record.number.get();
            if map.insert(n, record).is_some() {
                return Err(TicketError::DuplicateCategory(n));
            }
        }
        let eligible = map
            .iter()
            .filter(|(_, r)| !r.items.is_empty())
            .map(|(n, _)| *n)
            .collect();
        Ok(Self { records: map, eligible })
    }

    /// # Errors
    ///
    /// `CategoryNotFound`.
    pub fn lookup(&self, number: u8) -> Result<&CategoryRecord, TicketError> {
        self.records
            .get(&number)
            .ok_or_else(|| TicketError::CategoryNotFound(number.to_string()))
    }

    #[must_use]
    pub fn by_locator(&self, locator: &str) -> Option<&CategoryRecord> {
        self.records.values().find(|r| r.locator == locator)
    }

    /// Membership test used during verification.
    #[must_use]
    pub fn contains(&self, category: u8, item: &Item) -> bool {
        self.records.get(&category).is_some_and(|r| r.contains(item))
    }

    /// Uniform category among non-empty ones, then uniform item within it.
    ///
    /// # Errors
    ///
    /// `CatalogEmpty` or `Entropy`.
    pub fn pick_random<R: RngCore + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(Item, CategoryNumber), TicketError> {
        if self.eligible.is_empty() {
            return Err(TicketError::CatalogEmpty);
        }
        let n = self.eligible[uniform_index(rng, self.eligible.len())?];
        self.pick_in(n, rng)
    }

    /// Uniform item within category `number`.
    ///
    /// # Errors
    ///
    /// `CategoryNotFound`, `CatalogEmpty` for an empty category, or `Entropy`.
    pub fn pick_in<R: RngCore + ?Sized>(
        &self,
        number: u8,
        rng: &mut R,
    ) -> Result<(Item, CategoryNumber), TicketError> {
        let record = self.lookup(number)?;
        if record.items.is_empty() {
            return Err(TicketError::CatalogEmpty);
        }
        let item = record.items[uniform_index(rng, record.items.len())?];
        Ok((item, record.number))
    }

    pub fn records(&self) -> impl Iterator<Item = &CategoryRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of items across all categories.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.records.values().map(|r| r.items.len()).sum()
    }

    /// Size of the largest category, the pool a single issuance draws from at best.
    #[must_use]
    pub fn largest_category(&self) -> usize {
        self.records.values().map(|r| r.items.len()).max().unwrap_or(0)
    }
}

/// Unbiased index in `[0, n)` by rejection sampling.
///
/// # Errors
///
/// `Entropy` when the generator fails.
pub fn uniform_index<R: RngCore + ?Sized>(rng: &mut R, n: usize) -> Result<usize, TicketError> {
    if n <= 1 {
        return Ok(0);
    }
    let bound = n as u64;
    let bits = u64::BITS - (bound - 1).leading_zeros();
    loop {
        let mut buf = [0u8; 8];
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| TicketError::Entropy(e.to_string()))?;
        let candidate = u64::from_le_bytes(buf) >> (u64::BITS - bits);
        if candidate < bound {
            // candidate < n, so it fits in usize
            return usize::try_from(candidate).map_err(|_| TicketError::Entropy("index overflow".into()));
        }
    }
}
