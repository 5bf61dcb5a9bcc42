//! Canonical encoding for audit entries — the interop contract of spec.md
//! §4.1. `entry_hash` is SHA-512 over the UTF-8 bytes of this encoding, and
//! must match bit-for-bit between the writer, the validator, and any
//! migration backfill.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};

/// The fixed, explicit key set of the canonical mapping (spec.md §4.1).
pub const CANONICAL_FIELDS: &[&str] = &[
    "chain_index",
    "prev_hash",
    "created_at",
    "event_id",
    "action",
    "resource",
    "resource_id",
    "actor_key_id",
    "actor_role",
    "status",
    "reason",
];

/// The subset of `AuditEntry` that feeds the canonical hash — deliberately
/// separate from the persisted row type so callers can compute the hash
/// before the row exists (e.g. while still deciding `chain_index`).
#[derive(Debug, Clone)]
pub struct CanonicalFields {
    pub chain_index: u64,
    pub prev_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub event_id: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub actor_key_id: Option<String>,
    pub actor_role: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
}

/// Format a UTC instant as ISO-8601 with an explicit `+00:00` offset,
/// microsecond precision. `DateTime<Utc>`'s default `Display`/`to_rfc3339`
/// render the zone as `Z`; spec.md §4.1 requires the explicit offset form,
/// so this is formatted by hand rather than through `to_rfc3339`.
pub fn format_canonical_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

fn opt_str(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

/// Build the canonical, key-sorted JSON-shaped UTF-8 bytes for one entry.
///
/// Uses `serde_json::Map`, which (in the default, non-`preserve_order`
/// build selected by this crate's `Cargo.toml`) is a `BTreeMap` underneath —
/// lexicographic key order falls out of the serializer itself rather than a
/// hand-rolled sort step.
pub fn canonical_bytes(fields: &CanonicalFields) -> Vec<u8> {
    let mut map = Map::new();
    map.insert(
        "chain_index".to_string(),
        Value::Number(fields.chain_index.into()),
    );
    map.insert("prev_hash".to_string(), opt_str(&fields.prev_hash));
    map.insert(
        "created_at".to_string(),
        Value::String(format_canonical_timestamp(fields.created_at)),
    );
    map.insert("event_id".to_string(), Value::String(fields.event_id.clone()));
    map.insert("action".to_string(), Value::String(fields.action.clone()));
    map.insert("resource".to_string(), Value::String(fields.resource.clone()));
    map.insert("resource_id".to_string(), opt_str(&fields.resource_id));
    map.insert("actor_key_id".to_string(), opt_str(&fields.actor_key_id));
    map.insert("actor_role".to_string(), opt_str(&fields.actor_role));
    map.insert("status".to_string(), opt_str(&fields.status));
    map.insert("reason".to_string(), opt_str(&fields.reason));

    // serde_json::Value's Object serialization walks the BTreeMap in key
    // order, which is exactly the "keys sorted lexicographically" contract.
    serde_json::to_vec(&Value::Object(map)).expect("canonical map always serializes")
}

/// SHA-512 hex digest of the canonical encoding — `entry_hash`.
pub fn entry_hash(fields: &CanonicalFields) -> String {
    let bytes = canonical_bytes(fields);
    let digest = Sha512::digest(&bytes);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn golden_fields() -> CanonicalFields {
        CanonicalFields {
            chain_index: 1,
            prev_hash: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            event_id: "evt-0001".to_string(),
            action: "backup_processing_started".to_string(),
            resource: "backup".to_string(),
            resource_id: Some("backup-0001".to_string()),
            actor_key_id: Some("key-1".to_string()),
            actor_role: Some("operator".to_string()),
            status: None,
            reason: None,
        }
    }

    #[test]
    fn canonical_bytes_are_sorted_keys_no_whitespace() {
        let bytes = canonical_bytes(&golden_fields());
        let s = String::from_utf8(bytes).unwrap();
        assert!(!s.contains(' '));
        assert!(s.starts_with(r#"{"action":"backup_processing_started""#));
        assert!(s.contains(r#""prev_hash":null"#));
    }

    #[test]
    fn entry_hash_is_deterministic_golden_vector() {
        let fields = golden_fields();
        let h1 = entry_hash(&fields);
        let h2 = entry_hash(&fields);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 128);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_prev_hash_changes_entry_hash() {
        let mut fields = golden_fields();
        let base = entry_hash(&fields);
        fields.prev_hash = Some("a".repeat(128));
        let changed = entry_hash(&fields);
        assert_ne!(base, changed);
    }

    #[test]
    fn timestamp_uses_explicit_utc_offset() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_canonical_timestamp(dt), "2026-01-01T00:00:00.000000+00:00");
    }
}
