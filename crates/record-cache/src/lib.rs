//! # Record Cache
//!
//! An ephemeral file cache of fetched exchange records, keyed by the logical
//! request (account, dataset, period, symbols).
//!
//! It only avoids re-downloading history. Entries never expire on their own;
//! calendar-granular keys make "today" roll over at UTC midnight. Failed
//! fetches must not be stored.
//!
//! ## Public API
//!
//! - `RecordCache`: load/save record lists under a `CacheKey`.
//! - `CacheKey`: deterministic key builder.
//! - `sanitize_key` / `account_hash`: filename and account-identity helpers.

pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::{CacheKey, account_hash};
pub use store::{RecordCache, sanitize_key};
