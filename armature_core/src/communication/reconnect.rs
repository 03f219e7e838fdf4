//! Retry timing with exponential backoff for out-of-process peers
use serde::{Deserialize, Serialize};
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(1);
const BACKOFF_MULTIPLIER: f64 = 2.0;
const MAX_RETRIES: usize = 6; // 0 means infinite retries

/// Reconnection strategy with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectStrategy {
    #[serde(with = "duration_ms")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_ms")]
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub max_retries: usize, // 0 = infinite
    pub jitter: bool,       // ±20% spread on each delay
}

impl Default for ReconnectStrategy {
    fn default() -> Self {
        Self {
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            multiplier: BACKOFF_MULTIPLIER,
            max_retries: MAX_RETRIES,
            jitter: false,
        }
    }
}

impl ReconnectStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener readiness at startup: a couple of seconds in total
    pub fn readiness() -> Self {
        Self::default()
    }

    /// Create a strategy for testing (short backoffs, limited retries)
    pub fn testing() -> Self {
        Self {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            multiplier: 1.5,
            max_retries: 3,
            jitter: false,
        }
    }

    /// Calculate backoff delay for the given attempt
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_backoff.as_millis() as f64
            * self.multiplier.powi((attempt - 1) as i32);
        let capped_delay = Duration::from_millis(delay_ms as u64).min(self.max_backoff);

        if self.jitter {
            use std::collections::hash_map::RandomState;
            use std::hash::BuildHasher;

            let hash_value = RandomState::new().hash_one(attempt);
            let jitter_factor = 0.8 + (hash_value % 40) as f64 / 100.0; // 0.8 to 1.2
            Duration::from_millis((capped_delay.as_millis() as f64 * jitter_factor) as u64)
        } else {
            capped_delay
        }
    }

    /// Check if we should retry after this many attempts
    pub fn should_retry(&self, attempt: usize) -> bool {
        self.max_retries == 0 || attempt < self.max_retries
    }

    /// Upper bound on time spent sleeping between attempts; `None` if unbounded.
    pub fn total_budget(&self) -> Option<Duration> {
        if self.max_retries == 0 {
            return None;
        }
        Some((1..self.max_retries).map(|a| self.backoff_delay(a)).sum())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_increases() {
        let strategy = ReconnectStrategy::testing();

        let delay1 = strategy.backoff_delay(1);
        let delay2 = strategy.backoff_delay(2);
        let delay3 = strategy.backoff_delay(3);

        assert_eq!(strategy.backoff_delay(0), Duration::ZERO);
        assert!(delay2 > delay1);
        assert!(delay3 > delay2);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let strategy = ReconnectStrategy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            max_retries: 0,
            jitter: false,
        };

        assert_eq!(strategy.backoff_delay(100), Duration::from_secs(5));
        assert!(strategy.total_budget().is_none());
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let strategy = ReconnectStrategy {
            jitter: true,
            ..ReconnectStrategy::default()
        };
        for attempt in 1..6 {
            let base = ReconnectStrategy::default().backoff_delay(attempt);
            let delay = strategy.backoff_delay(attempt);
            assert!(delay.as_millis() as f64 >= base.as_millis() as f64 * 0.79);
            assert!(delay.as_millis() as f64 <= base.as_millis() as f64 * 1.21);
        }
    }

    #[test]
    fn test_max_retries() {
        let strategy = ReconnectStrategy::testing();
        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(2));
        assert!(!strategy.should_retry(3));
        // 10ms + 15ms between the three attempts
        assert_eq!(strategy.total_budget(), Some(Duration::from_millis(25)));
    }

    #[test]
    fn test_deserialize_from_millis() {
        let strategy: ReconnectStrategy =
            serde_json::from_str(r#"{"initial_backoff": 20, "max_retries": 2}"#).unwrap();
        assert_eq!(strategy.initial_backoff, Duration::from_millis(20));
        assert_eq!(strategy.max_retries, 2);
        assert_eq!(strategy.max_backoff, MAX_BACKOFF);
    }
}
