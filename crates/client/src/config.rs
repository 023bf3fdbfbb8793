//! Client configuration from environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:4014/api";
pub const DEFAULT_WEBSOCKET_URL: &str = "ws://localhost:4014/events";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_UNREAD_POLL_MS: u64 = 30_000;
pub const DEFAULT_CLOCK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_RADIO_PULSE_MS: u64 = 1_000;

/// Endpoints and timing for one client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL that RPC paths are appended to.
    pub api_url: String,
    /// Push endpoint; the bunker's broadcast id is added as a query parameter.
    pub websocket_url: String,
    /// Flat delay between reconnect attempts. There is no backoff and no
    /// attempt limit.
    pub reconnect_delay_ms: u64,
    pub unread_poll_ms: u64,
    pub clock_interval_ms: u64,
    /// How long the radio-activity flag stays raised after a broadcast.
    pub radio_pulse_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            unread_poll_ms: DEFAULT_UNREAD_POLL_MS,
            clock_interval_ms: DEFAULT_CLOCK_INTERVAL_MS,
            radio_pulse_ms: DEFAULT_RADIO_PULSE_MS,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `BUNKER_API_URL` (default: "http://localhost:4014/api")
    /// - `BUNKER_WEBSOCKET_URL` (default: "ws://localhost:4014/events")
    /// - `BUNKER_RECONNECT_DELAY_MS` (default: 5000)
    /// - `BUNKER_UNREAD_POLL_MS` (default: 30000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup("BUNKER_API_URL").unwrap_or(defaults.api_url),
            websocket_url: lookup("BUNKER_WEBSOCKET_URL").unwrap_or(defaults.websocket_url),
            reconnect_delay_ms: millis(&lookup, "BUNKER_RECONNECT_DELAY_MS", defaults.reconnect_delay_ms),
            unread_poll_ms: millis(&lookup, "BUNKER_UNREAD_POLL_MS", defaults.unread_poll_ms),
            ..defaults
        }
    }

    // Zero periods are not usable as timer intervals; they read as the default.

    pub fn reconnect_delay(&self) -> Duration {
        non_zero("reconnectDelayMs", self.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS)
    }

    pub fn unread_poll_interval(&self) -> Duration {
        non_zero("unreadPollMs", self.unread_poll_ms, DEFAULT_UNREAD_POLL_MS)
    }

    pub fn clock_interval(&self) -> Duration {
        non_zero("clockIntervalMs", self.clock_interval_ms, DEFAULT_CLOCK_INTERVAL_MS)
    }

    pub fn radio_pulse(&self) -> Duration {
        non_zero("radioPulseMs", self.radio_pulse_ms, DEFAULT_RADIO_PULSE_MS)
    }
}

fn non_zero(name: &str, value: u64, default: u64) -> Duration {
    if value == 0 {
        crate::log_warn!("Ignoring {}=0, using {}ms", name, default);
        return Duration::from_millis(default);
    }
    Duration::from_millis(value)
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                crate::log_warn!("Ignoring invalid {}={:?}, using {}ms", key, raw, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_fixed_timings() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.unread_poll_interval(), Duration::from_secs(30));
        assert_eq!(config.clock_interval(), Duration::from_secs(1));
        assert_eq!(config.radio_pulse(), Duration::from_secs(1));
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("BUNKER_API_URL", "https://bunker.example/api"),
            ("BUNKER_WEBSOCKET_URL", "wss://bunker.example/events"),
            ("BUNKER_RECONNECT_DELAY_MS", "250"),
        ]));
        assert_eq!(config.api_url, "https://bunker.example/api");
        assert_eq!(config.websocket_url, "wss://bunker.example/events");
        assert_eq!(config.reconnect_delay(), Duration::from_millis(250));
        assert_eq!(config.unread_poll_ms, DEFAULT_UNREAD_POLL_MS);
    }

    #[test]
    fn malformed_numbers_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("BUNKER_RECONNECT_DELAY_MS", "soon"),
            ("BUNKER_UNREAD_POLL_MS", "0"),
        ]));
        assert_eq!(config.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
        assert_eq!(config.unread_poll_ms, DEFAULT_UNREAD_POLL_MS);
    }

    #[test]
    fn zero_periods_read_as_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"reconnectDelayMs":0,"unreadPollMs":0,"clockIntervalMs":0,"radioPulseMs":0}"#,
        )
        .unwrap();
        assert_eq!(config.clock_interval_ms, 0);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS));
        assert_eq!(config.unread_poll_interval(), Duration::from_millis(DEFAULT_UNREAD_POLL_MS));
        assert_eq!(config.clock_interval(), Duration::from_millis(DEFAULT_CLOCK_INTERVAL_MS));
        assert_eq!(config.radio_pulse(), Duration::from_millis(DEFAULT_RADIO_PULSE_MS));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"websocketUrl":"ws://10.0.0.2:4014/events"}"#).unwrap();
        assert_eq!(config.websocket_url, "ws://10.0.0.2:4014/events");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
