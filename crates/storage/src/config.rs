use std::time::Duration;

/// Lease and retry tuning for [`LockingMap`](crate::LockingMap) and
/// [`StatefulExecutor`](crate::StatefulExecutor).
///
/// The defaults give a 60 s lease and a retry window of the same length
/// (600 attempts, 100 ms apart).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    pub lease_duration: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(60),
            retry_count: 600,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl LockConfig {
    pub fn with_lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    pub fn with_retries(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    pub(crate) fn lease_millis(&self) -> i64 {
        i64::try_from(self.lease_duration.as_millis()).unwrap_or(i64::MAX)
    }
}
