#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_panics_doc)]

//! FSG tickets: self-authenticating seed tickets.
//!
//! A ticket binds a 64-bit seed, its category and the issuance time under a
//! truncated HMAC-SHA-256 tag, encrypts the result with AES and renders it as
//! a short hex string:
//!
//! ```text
//! item(8) || category(1) || BE32(timestamp)(4) || tag(3 or 19)  -> AES-ECB -> "4-....-....-....-...."
//! ```
//!
//! Clients show the ticket back together with the seed they claim it names.
//! Verification needs only the key and salt; no issuance state is stored.
//! Tickets are *live* for two hours after issuance and *dead* (reduced
//! rewards) until two weeks have passed.

// Layout and codec
pub mod types;
pub mod errors;
pub mod ser;
pub mod crypto;
pub mod display;

// Key material, seeds, time
pub mod keys;
pub mod catalog;
pub mod seedfile;
pub mod clock;

// Protocol
pub mod ticket;
pub mod issuer;
pub mod verifier;
pub mod rate_limit;
pub mod throttle;

// Wiring
pub mod config;
pub mod service;

pub use types::*;
pub use errors::{TicketError, VerifyFailure};
pub use display::{from_display_string, to_display_string};
pub use keys::KeyMaterial;
pub use catalog::{CatalogLoader, CategoryRecord, SeedCatalog};
pub use seedfile::{load_seed_file, load_seed_list, pack_seed_file, read_seed_list, SeedDirLoader, SeedFile};
pub use clock::{ManualClock, SystemClock, TicketClock, TimeSource};
pub use ticket::{classify_period, open_ticket, seal_ticket, OpenedTicket, PeriodWindows};
pub use issuer::{IssueOptions, IssuedTicket, TicketIssuer};
pub use verifier::{TicketVerifier, Verdict, VerificationResult, VerifiedTicket};
pub use rate_limit::{Action, RateLimitConfig, RateLimiter, WindowLimit};
pub use throttle::{ThrottleGate, ThrottlePolicy};
pub use config::TicketConfig;
pub use service::TicketService;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
