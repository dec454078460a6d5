// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration record for building an [`IntervalTimer`](crate::IntervalTimer).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an interval timer.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Time between two firings, in milliseconds.
    pub period_ms: u64,
    /// Whether the timer re-arms after firing.
    pub repeat: bool,
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            repeat: true,
            thread_name: "onion-timer".to_string(),
        }
    }
}

impl TimerConfig {
    /// Returns the period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Sets the period. Sub-millisecond precision is truncated.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets whether the timer repeats.
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TimerConfig::default();
        assert_eq!(config.period(), Duration::from_secs(1));
        assert!(config.repeat);
        assert_eq!(config.thread_name, "onion-timer");
    }

    #[test]
    fn test_builder_truncates_to_millis() {
        let config = TimerConfig::default()
            .with_period(Duration::from_micros(2_500))
            .with_repeat(false)
            .with_thread_name("hud-blink");

        assert_eq!(config.period_ms, 2);
        assert!(!config.repeat);
        assert_eq!(config.thread_name, "hud-blink");
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: TimerConfig = serde_json::from_str(r#"{ "period_ms": 250 }"#).unwrap();
        assert_eq!(config.period(), Duration::from_millis(250));
        assert!(config.repeat);
        assert_eq!(config.thread_name, "onion-timer");
    }
}
