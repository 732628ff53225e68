//! Storage key conventions for one session.
//!
//! The state row and the traffic rows share a backend; only the partition
//! keys tell them apart.

pub use parley_storage::STATE_SORT_KEY;

/// Partition holding the session's scenario state (sort key `"state"`).
pub fn session_state_key(session_id: &str) -> String {
    format!("session#{session_id}")
}

/// Partition holding the session's captured exchanges, one row per exchange.
pub fn session_traffic_key(session_id: &str) -> String {
    format!("session#{session_id}#traffic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traffic_and_state_partitions_differ() {
        assert_eq!(session_state_key("demo"), "session#demo");
        assert_eq!(session_traffic_key("demo"), "session#demo#traffic");
        assert_ne!(session_state_key("a"), session_traffic_key("a"));
    }
}
