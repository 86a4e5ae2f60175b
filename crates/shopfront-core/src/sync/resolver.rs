//! Field-level last-write-wins merge of two versions of one record.

use chrono::{DateTime, Utc};

use crate::models::Record;

/// Merge `local` and `remote`, stamping the result with the current time.
pub fn resolve(local: &Record, remote: &Record) -> Record {
    resolve_at(local, remote, Utc::now())
}

/// Merge `local` and `remote`, stamping the result with `merged_at`.
///
/// For every field present on either side the remote value is taken when the
/// field is absent locally or `remote.updated_at` is strictly later;
/// otherwise the local value stays. Equal timestamps keep local values.
/// `created_at` follows the same rule. Concurrent edits of the same field
/// keep only the later write.
pub fn resolve_at(local: &Record, remote: &Record, merged_at: DateTime<Utc>) -> Record {
    let remote_newer = remote.updated_at > local.updated_at;

    let mut fields = local.fields.clone();
    for (key, remote_value) in &remote.fields {
        if remote_newer || !fields.contains_key(key) {
            fields.insert(key.clone(), remote_value.clone());
        }
    }

    Record {
        id: local.id.clone(),
        created_at: if remote_newer {
            remote.created_at
        } else {
            local.created_at
        },
        updated_at: merged_at,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    #[test]
    fn newer_remote_wins_shared_fields() {
        let local = Record::new("p1", ts("2024-01-01T00:00:00Z"))
            .with_field("x", 1)
            .with_field("y", 1);
        let remote = Record::new("p1", ts("2024-01-02T00:00:00Z"))
            .with_field("x", 2)
            .with_field("y", 1);
        let merged_at = ts("2024-02-01T00:00:00Z");

        let merged = resolve_at(&local, &remote, merged_at);
        assert_eq!(merged.field("x"), Some(&json!(2)));
        assert_eq!(merged.field("y"), Some(&json!(1)));
        assert_eq!(merged.updated_at, merged_at);
        assert_eq!(merged.id, "p1");
    }

    #[test]
    fn newer_local_keeps_its_values_but_gains_missing_fields() {
        let local = Record::new("p1", ts("2024-01-03T00:00:00Z")).with_field("stock", 4);
        let remote = Record::new("p1", ts("2024-01-02T00:00:00Z"))
            .with_field("stock", 9)
            .with_field("barcode", "4006381333931");

        let merged = resolve_at(&local, &remote, ts("2024-02-01T00:00:00Z"));
        assert_eq!(merged.field("stock"), Some(&json!(4)));
        assert_eq!(merged.field("barcode"), Some(&json!("4006381333931")));
    }

    #[test]
    fn equal_timestamps_keep_local_values() {
        let at = ts("2024-01-01T00:00:00Z");
        let local = Record::new("p1", at).with_field("price", 10);
        let remote = Record::new("p1", at).with_field("price", 12);

        let merged = resolve_at(&local, &remote, ts("2024-02-01T00:00:00Z"));
        assert_eq!(merged.field("price"), Some(&json!(10)));
    }

    #[test]
    fn local_only_fields_survive_a_newer_remote() {
        let local = Record::new("inv-1", ts("2024-01-01T00:00:00Z")).with_field("note", "paid");
        let remote = Record::new("inv-1", ts("2024-01-05T00:00:00Z")).with_field("total", 30);

        let merged = resolve_at(&local, &remote, ts("2024-02-01T00:00:00Z"));
        assert_eq!(merged.field("note"), Some(&json!("paid")));
        assert_eq!(merged.field("total"), Some(&json!(30)));
        assert_eq!(merged.created_at, remote.created_at);
    }

    #[test]
    fn resolve_stamps_wall_clock_time() {
        let local = Record::new("p1", ts("2024-01-01T00:00:00Z"));
        let remote = Record::new("p1", ts("2024-01-02T00:00:00Z"));
        let before = Utc::now();

        let merged = resolve(&local, &remote);
        assert!(merged.updated_at >= before);
    }
}
