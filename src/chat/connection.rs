use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Lifecycle of the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    /// Reconnect budget exhausted. Terminal for the channel.
    Unavailable,
}

/// Bounded retries with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// What the session should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    RetryAfter(Duration),
    GiveUp { attempts: u32 },
}

/// Connection state machine; the session drives it, it never touches the network.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failed_attempts: u32,
}

impl ConnectionTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Starts the next attempt, or `None` once the session is unavailable.
    pub fn begin_attempt(&mut self) -> Option<ConnectionState> {
        if self.state == ConnectionState::Unavailable {
            return None;
        }
        self.state = ConnectionState::Connecting {
            attempt: self.failed_attempts + 1,
        };
        Some(self.state)
    }

    pub fn on_connected(&mut self) -> ConnectionState {
        self.failed_attempts = 0;
        self.state = ConnectionState::Connected;
        self.state
    }

    pub fn on_attempt_failed(&mut self) -> NextStep {
        self.failed_attempts += 1;
        if self.failed_attempts >= self.policy.max_attempts {
            self.state = ConnectionState::Unavailable;
            NextStep::GiveUp {
                attempts: self.failed_attempts,
            }
        } else {
            self.state = ConnectionState::Disconnected;
            NextStep::RetryAfter(self.policy.delay())
        }
    }

    /// An established channel dropped; a fresh retry budget applies.
    pub fn on_dropped(&mut self) -> ConnectionState {
        if self.state != ConnectionState::Unavailable {
            self.state = ConnectionState::Disconnected;
        }
        self.state
    }

    pub fn teardown(&mut self) -> ConnectionState {
        if self.state != ConnectionState::Unavailable {
            self.state = ConnectionState::Disconnected;
        }
        self.state
    }
}
