//! Engine configuration

use std::time::Duration;

use tracing::warn;

use crate::core::accrual::MS_PER_DAY;

/// Tunables shared by both engines and the accrual scheduler
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Length of one accrual day; shortened in tests and demos
    pub ms_per_day: i64,
    /// Period of the background accrual tick
    pub accrual_interval: Duration,
    /// Upper bound on a single persistence call in the async engine
    pub persist_timeout: Duration,
    /// Maximum number of users accrued concurrently by one scheduler pass
    pub max_concurrent_users: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ms_per_day: MS_PER_DAY,
            accrual_interval: Duration::from_secs(60),
            persist_timeout: Duration::from_secs(5),
            max_concurrent_users: num_cpus::get(),
        }
    }
}

impl EngineConfig {
    /// Create a config, replacing zero or negative values by the defaults
    pub fn new(
        ms_per_day: i64,
        accrual_interval: Duration,
        persist_timeout: Duration,
        max_concurrent_users: usize,
    ) -> Self {
        let default = Self::default();

        let ms_per_day = if ms_per_day <= 0 {
            warn!(
                ms_per_day,
                default = default.ms_per_day,
                "invalid ms_per_day, using default"
            );
            default.ms_per_day
        } else {
            ms_per_day
        };

        let accrual_interval = if accrual_interval.is_zero() {
            warn!(
                default_ms = default.accrual_interval.as_millis() as u64,
                "invalid accrual_interval (0), using default"
            );
            default.accrual_interval
        } else {
            accrual_interval
        };

        let persist_timeout = if persist_timeout.is_zero() {
            warn!(
                default_ms = default.persist_timeout.as_millis() as u64,
                "invalid persist_timeout (0), using default"
            );
            default.persist_timeout
        } else {
            persist_timeout
        };

        let max_concurrent_users = if max_concurrent_users == 0 {
            warn!(
                default = default.max_concurrent_users,
                "invalid max_concurrent_users (0), using default"
            );
            default.max_concurrent_users
        } else {
            max_concurrent_users
        };

        Self {
            ms_per_day,
            accrual_interval,
            persist_timeout,
            max_concurrent_users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_uses_real_days() {
        let config = EngineConfig::default();
        assert_eq!(config.ms_per_day, 86_400_000);
        assert_eq!(config.accrual_interval, Duration::from_secs(60));
        assert_eq!(config.persist_timeout, Duration::from_secs(5));
        assert!(config.max_concurrent_users >= 1);
    }

    #[test]
    fn test_valid_values_are_kept() {
        let config =
            EngineConfig::new(1_000, Duration::from_millis(10), Duration::from_millis(50), 3);
        assert_eq!(config.ms_per_day, 1_000);
        assert_eq!(config.accrual_interval, Duration::from_millis(10));
        assert_eq!(config.persist_timeout, Duration::from_millis(50));
        assert_eq!(config.max_concurrent_users, 3);
    }

    #[rstest]
    #[case::zero_day(0, 1, 1, 1)]
    #[case::negative_day(-5, 1, 1, 1)]
    #[case::zero_interval(1_000, 0, 1, 1)]
    #[case::zero_timeout(1_000, 1, 0, 1)]
    #[case::zero_concurrency(1_000, 1, 1, 0)]
    fn test_invalid_values_fall_back_to_defaults(
        #[case] ms_per_day: i64,
        #[case] interval_ms: u64,
        #[case] timeout_ms: u64,
        #[case] concurrency: usize,
    ) {
        let default = EngineConfig::default();
        let config = EngineConfig::new(
            ms_per_day,
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
            concurrency,
        );

        assert!(config.ms_per_day > 0);
        assert!(!config.accrual_interval.is_zero());
        assert!(!config.persist_timeout.is_zero());
        assert!(config.max_concurrent_users > 0);
        if ms_per_day <= 0 {
            assert_eq!(config.ms_per_day, default.ms_per_day);
        }
        if concurrency == 0 {
            assert_eq!(config.max_concurrent_users, default.max_concurrent_users);
        }
    }
}
