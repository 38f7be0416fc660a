//! ID and timestamp utilities for marginalia
//!
//! Provides opaque record identifiers and the local ISO-8601 timestamps
//! stamped onto posts, comments, and post metadata.

use chrono::{Local, SecondsFormat};
use rand::Rng;

/// Current local time as ISO-8601 with second precision and UTC offset.
///
/// Example: `2026-08-23T14:05:09+02:00`
pub fn now_local_iso() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Generate an opaque record ID
///
/// Format: 16 hex chars from 8 random bytes.
/// Example: `9f3a0c11b2d45e07`
pub fn generate_record_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_local_iso_second_precision() {
        let ts = now_local_iso();
        // Second precision means no fractional seconds.
        assert!(!ts.contains('.'));
        // RFC 3339 date/time separator.
        assert!(ts.contains('T'));
    }

    #[test]
    fn test_now_local_iso_parses_back() {
        let ts = now_local_iso();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_generate_record_id_format() {
        let id = generate_record_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_record_id_uniqueness() {
        let id1 = generate_record_id();
        let id2 = generate_record_id();
        assert_ne!(id1, id2);
    }
}
