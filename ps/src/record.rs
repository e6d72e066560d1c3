//! Record trait for persistable domain types

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A domain type that can be persisted by a [`crate::Store`]
///
/// Each record type maps to one collection directory; each record
/// instance maps to one JSON file named after its id.
pub trait Record: Serialize + DeserializeOwned {
    /// Unique identifier, used as the file name
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection this record type belongs to (e.g. "plans")
    fn collection_name() -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_monotonic_enough() {
        let a = now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_ms();
        assert!(b > a);
    }
}
