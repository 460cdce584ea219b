//! Time utilities for the Cambio ledger.

use chrono::{DateTime, Utc};

/// A timestamp with timezone (always UTC for ledger records).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}
