//! Facade configuration

use rosbridge_protocol::{CompressionType, DEFAULT_MAX_FRAME_BYTES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for a [`Ros`](crate::Ros) instance
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use rosbridge_client::RosConfig;
///
/// let config = RosConfig::from_json_str(r#"{"call_timeout_ms": 2000}"#).unwrap();
/// assert_eq!(config.call_timeout().unwrap().as_millis(), 2000);
/// assert_eq!(config.default_throttle_rate, 0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosConfig {
    /// Upper bound for blocking and async service calls; `None` waits forever
    pub call_timeout_ms: Option<u64>,
    /// Throttle rate used by [`Topic`](crate::Topic) when none is given
    pub default_throttle_rate: u32,
    /// Compression requested by [`Topic`](crate::Topic) when none is given
    pub default_compression: CompressionType,
    /// Frames above this size are dropped before parsing
    pub max_frame_bytes: usize,
}

impl Default for RosConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: None,
            default_throttle_rate: 0,
            default_compression: CompressionType::None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl RosConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    /// Returns a copy with the given call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}
