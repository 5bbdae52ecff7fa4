//! Reconnect policy and per-channel reconnect state

use std::time::Duration;

/// How a channel retries after losing its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Automatic attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_interval: Duration,
    /// Upper bound for any single delay
    pub cap_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_interval: Duration::from_millis(3000),
            cap_delay: Duration::from_millis(30000),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base_interval * 2^attempt, cap_delay)`, saturating for any attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_interval.as_millis().min(u64::MAX as u128) as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));
        delay.min(self.cap_delay)
    }
}

/// Snapshot of a channel's health, as shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStatus {
    pub connected: bool,
    pub attempt: u32,
    pub exhausted: bool,
}

/// What to do after a connection closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`; `attempt` is the new attempt count
    Retry { attempt: u32, delay: Duration },
    /// Retry budget spent
    Exhausted,
}

/// Reconnect bookkeeping owned by one channel
#[derive(Debug, Clone, Default)]
pub struct ReconnectState {
    attempt: u32,
    connected: bool,
    exhausted: bool,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Transport opened
    pub fn on_open(&mut self) {
        self.connected = true;
        self.attempt = 0;
        self.exhausted = false;
    }

    /// Transport closed or never opened
    pub fn on_close(&mut self, policy: &ReconnectPolicy) -> RetryDecision {
        self.connected = false;
        if self.attempt < policy.max_attempts {
            let delay = policy.delay_for(self.attempt);
            self.attempt += 1;
            RetryDecision::Retry {
                attempt: self.attempt,
                delay,
            }
        } else {
            self.exhausted = true;
            RetryDecision::Exhausted
        }
    }

    /// Manual reconnect: drop the live transport and start over with a full retry budget
    pub fn reset(&mut self) {
        self.connected = false;
        self.attempt = 0;
        self.exhausted = false;
    }

    /// Channel torn down
    pub fn on_shutdown(&mut self) {
        self.connected = false;
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: self.connected,
            attempt: self.attempt,
            exhausted: self.exhausted,
        }
    }
}
