//! Login record value type.

use serde::{Deserialize, Serialize};

/// A stored login entry.
///
/// The data store treats records as opaque beyond id-based lookup and the
/// ordering applied to the record-list stream; fields are passed through
/// unchanged from the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    /// Stable identifier assigned by the storage engine.
    pub id: String,
    /// Origin the login belongs to.
    pub hostname: String,
    /// Username, if the site uses one.
    pub username: Option<String>,
    /// The stored password.
    pub password: String,
    /// Last-used timestamp in milliseconds since the Unix epoch. Updated by
    /// the engine's `touch` operation.
    pub time_last_used: i64,
}

impl LoginRecord {
    /// Creates a record with the given id and hostname and empty secrets.
    /// Convenience for tests and fixtures.
    #[must_use]
    pub fn stub<S: Into<String>>(id: S, hostname: S) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            username: None,
            password: String::new(),
            time_last_used: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrips_through_json() {
        let record = LoginRecord {
            id: "rec-1".to_string(),
            hostname: "example.com".to_string(),
            username: Some("user".to_string()),
            password: "hunter2".to_string(),
            time_last_used: 1_700_000_000_000,
        };

        let json = serde_json::to_string(&record).unwrap();
        let decoded: LoginRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }
}
