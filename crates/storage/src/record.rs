use serde::{Deserialize, Serialize};

/// One row of a sorted-partition store.
///
/// `locked_by`/`locked_until` are only used by rows managed through
/// [`LockingMap`](crate::LockingMap); log rows leave them empty. `revision`
/// is assigned by the backend on every successful conditional write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub partition_key: String,
    pub sort_key: String,
    pub value: Option<serde_json::Value>,
    pub locked_by: Option<String>,
    /// Lease expiry in Unix epoch milliseconds.
    pub locked_until: Option<i64>,
    #[serde(default)]
    pub revision: u64,
}

impl LockRecord {
    pub fn new(partition_key: &str, sort_key: &str, value: Option<serde_json::Value>) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            sort_key: sort_key.to_string(),
            value,
            locked_by: None,
            locked_until: None,
            revision: 0,
        }
    }

    /// The holder and expiry of a lease that is still live at `now`.
    pub fn live_lease(&self, now: i64) -> Option<(&str, i64)> {
        match (&self.locked_by, self.locked_until) {
            (Some(holder), Some(until)) if until > now => Some((holder.as_str(), until)),
            _ => None,
        }
    }
}

/// Proof of a lease granted by [`LockingMap::load`](crate::LockingMap::load).
///
/// The holder string is the only identity carried: a caller presenting a
/// token after its lease lapsed is indistinguishable from any other stale
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    holder: String,
    locked_until: i64,
}

impl LockToken {
    pub(crate) fn new(holder: String, locked_until: i64) -> Self {
        Self {
            holder,
            locked_until,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Lease expiry in Unix epoch milliseconds.
    pub fn locked_until(&self) -> i64 {
        self.locked_until
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.locked_until <= now
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_lease_is_not_live() {
        let mut record = LockRecord::new("p", "state", None);
        record.locked_by = Some("a".into());
        record.locked_until = Some(100);
        assert_eq!(record.live_lease(99), Some(("a", 100)));
        assert_eq!(record.live_lease(100), None);
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = LockRecord::new("session#1", "state", Some(serde_json::json!({"a": 1})));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["partitionKey"], "session#1");
        assert_eq!(json["sortKey"], "state");
        assert!(json["lockedBy"].is_null());
    }
}
