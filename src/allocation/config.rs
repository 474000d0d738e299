//! Engine configuration.

use std::time::Duration;

/// Configuration for the [`AllocationEngine`](super::AllocationEngine).
///
/// # Examples
///
/// ```
/// use u_allocate::allocation::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_timeout_secs(30)
///     .with_progress_interval(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// assert!(!config.debug);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enumerate feasible allocations instead of optimizing one.
    pub debug: bool,

    /// Wall-clock budget for the backend, in seconds. `None` = no limit.
    pub timeout_secs: Option<u64>,

    /// How often the progress task wakes up.
    pub progress_interval: Duration,

    /// Without a timeout, warn once after the solve has run this long.
    pub long_run_warning: Duration,

    /// Maximum number of snapshots kept in debug mode.
    pub enumeration_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            timeout_secs: None,
            progress_interval: Duration::from_secs(5),
            long_run_warning: Duration::from_secs(30),
            enumeration_cap: 100,
        }
    }
}

impl EngineConfig {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_long_run_warning(mut self, after: Duration) -> Self {
        self.long_run_warning = after;
        self
    }

    pub fn with_enumeration_cap(mut self, cap: usize) -> Self {
        self.enumeration_cap = cap;
        self
    }

    /// Timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be positive".into());
        }
        if self.progress_interval.is_zero() {
            return Err("progress_interval must be non-zero".into());
        }
        if self.enumeration_cap == 0 {
            return Err("enumeration_cap must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.debug);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.enumeration_cap, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_conversion() {
        let config = EngineConfig::default().with_timeout_secs(3);
        assert_eq!(config.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(EngineConfig::default().with_timeout_secs(0).validate().is_err());
        assert!(EngineConfig::default()
            .with_progress_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_enumeration_cap(0)
            .validate()
            .is_err());
    }
}
