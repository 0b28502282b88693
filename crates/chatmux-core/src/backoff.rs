use std::time::Duration;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const RECONNECT_STEP: Duration = Duration::from_secs(2);
pub const RECONNECT_CAP: Duration = Duration::from_secs(30);

/// Wait before reconnect attempt `attempt` (1-based): `attempt * 2s`, capped at 30s.
pub fn reconnect_delay(attempt: u32) -> Duration {
    RECONNECT_STEP.saturating_mul(attempt).min(RECONNECT_CAP)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Delays for every attempt this policy allows, in order.
    pub fn schedule(&self) -> impl Iterator<Item = (u32, Duration)> {
        (1..=self.max_attempts).map(|attempt| (attempt, reconnect_delay(attempt)))
    }
}
