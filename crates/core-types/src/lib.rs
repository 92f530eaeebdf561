pub mod enums;
pub mod error;
pub mod period;
pub mod record;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{Dataset, Endpoint};
pub use error::CoreError;
pub use period::{Period, parse_datetime};
pub use record::RawRecord;
pub use structs::{Credentials, Page, TimeWindow};
