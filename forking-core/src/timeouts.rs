//! The Timeout Registry.
//!
//! Every blocking or polling operation of the service is bounded by one of
//! the durations below. The constants are the defaults; a [`Timeouts`] value
//! carries the (possibly overridden) set actually used by a service instance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a single accept waits before the loop re-checks the termination flag.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

/// How long an accepted control connection may take to deliver its request line.
pub const WAIT_FOR_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll interval used while waiting for children to exit.
pub const SLEEP_FOR_CHILDREN_TIMEOUT: Duration = Duration::from_secs(1);

/// Total time the service waits for children when draining.
pub const WAIT_FOR_CHILDREN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The set of durations a service instance runs with.
///
/// In settings files every field is expressed as fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(with = "seconds", default = "default_socket_timeout")]
    socket_timeout: Duration,
    #[serde(with = "seconds", default = "default_request_timeout")]
    request_timeout: Duration,
    #[serde(with = "seconds", default = "default_sleep_for_children")]
    sleep_for_children: Duration,
    #[serde(with = "seconds", default = "default_wait_for_children")]
    wait_for_children: Duration,
}

fn default_socket_timeout() -> Duration {
    SOCKET_TIMEOUT
}

fn default_request_timeout() -> Duration {
    WAIT_FOR_REQUEST_TIMEOUT
}

fn default_sleep_for_children() -> Duration {
    SLEEP_FOR_CHILDREN_TIMEOUT
}

fn default_wait_for_children() -> Duration {
    WAIT_FOR_CHILDREN_TIMEOUT
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            socket_timeout: SOCKET_TIMEOUT,
            request_timeout: WAIT_FOR_REQUEST_TIMEOUT,
            sleep_for_children: SLEEP_FOR_CHILDREN_TIMEOUT,
            wait_for_children: WAIT_FOR_CHILDREN_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_sleep_for_children(mut self, interval: Duration) -> Self {
        self.sleep_for_children = interval;
        self
    }

    pub fn with_wait_for_children(mut self, timeout: Duration) -> Self {
        self.wait_for_children = timeout;
        self
    }

    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn sleep_for_children(&self) -> Duration {
        self.sleep_for_children
    }

    pub fn wait_for_children(&self) -> Duration {
        self.wait_for_children
    }
}

/// (De)serializes a `Duration` as fractional seconds.
mod seconds {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.socket_timeout(), SOCKET_TIMEOUT);
        assert_eq!(timeouts.request_timeout(), WAIT_FOR_REQUEST_TIMEOUT);
        assert_eq!(timeouts.sleep_for_children(), SLEEP_FOR_CHILDREN_TIMEOUT);
        assert_eq!(timeouts.wait_for_children(), WAIT_FOR_CHILDREN_TIMEOUT);
    }

    #[test]
    fn test_overrides_only_touch_their_field() {
        let timeouts = Timeouts::default()
            .with_socket_timeout(Duration::from_millis(50))
            .with_wait_for_children(Duration::from_secs(2));

        assert_eq!(timeouts.socket_timeout(), Duration::from_millis(50));
        assert_eq!(timeouts.wait_for_children(), Duration::from_secs(2));
        assert_eq!(timeouts.request_timeout(), WAIT_FOR_REQUEST_TIMEOUT);
        assert_eq!(timeouts.sleep_for_children(), SLEEP_FOR_CHILDREN_TIMEOUT);
    }
}
