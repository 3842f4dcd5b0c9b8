//! Configuration for the eventing core.

use std::time::Duration;

use crate::error::EventError;

/// Tunables for subscription and notification handling.
///
/// Every network call the eventing core makes is bounded by one of these
/// timeouts, so a single unresponsive player can only stall operations on
/// its own subscriptions.
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Timeout for the initial SUBSCRIBE request.
    /// Default: 3 seconds
    pub subscribe_timeout: Duration,

    /// Timeout for renewal SUBSCRIBE requests.
    /// Default: 3 seconds
    pub renew_timeout: Duration,

    /// Timeout for UNSUBSCRIBE requests. Teardown is best-effort, so this
    /// is kept short.
    /// Default: 1 second
    pub unsubscribe_timeout: Duration,

    /// Subscription duration to request from the device, in seconds.
    /// `None` sends no TIMEOUT header and lets the device pick; the granted
    /// value always comes from the response either way.
    /// Default: None
    pub requested_timeout: Option<u32>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            subscribe_timeout: Duration::from_secs(3),
            renew_timeout: Duration::from_secs(3),
            unsubscribe_timeout: Duration::from_secs(1),
            requested_timeout: None,
        }
    }
}

impl EventConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn with_renew_timeout(mut self, timeout: Duration) -> Self {
        self.renew_timeout = timeout;
        self
    }

    pub fn with_unsubscribe_timeout(mut self, timeout: Duration) -> Self {
        self.unsubscribe_timeout = timeout;
        self
    }

    pub fn with_requested_timeout(mut self, seconds: u32) -> Self {
        self.requested_timeout = Some(seconds);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.subscribe_timeout.is_zero()
            || self.renew_timeout.is_zero()
            || self.unsubscribe_timeout.is_zero()
        {
            return Err(EventError::Configuration(
                "request timeouts must be greater than zero".to_string(),
            ));
        }
        if self.requested_timeout == Some(0) {
            return Err(EventError::Configuration(
                "requested subscription timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EventConfig::default();
        assert_eq!(config.subscribe_timeout, Duration::from_secs(3));
        assert_eq!(config.unsubscribe_timeout, Duration::from_secs(1));
        assert_eq!(config.requested_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = EventConfig::new()
            .with_subscribe_timeout(Duration::from_secs(5))
            .with_requested_timeout(1800);
        assert_eq!(config.subscribe_timeout, Duration::from_secs(5));
        assert_eq!(config.requested_timeout, Some(1800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = EventConfig::new().with_renew_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = EventConfig::new().with_requested_timeout(0);
        assert!(config.validate().is_err());
    }
}
