//! Retry and throttling policy for password attempts

use std::time::Duration;

/// Controls how the prompting decrypt flow retries.
///
/// The default allows unlimited attempts with no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecryptionPolicy {
    /// Sleep applied before every password attempt, including the first,
    /// to slow down password guessing.
    pub password_delay: Duration,
    /// Maximum number of password attempts. `0` means unlimited, `1` means
    /// no retries.
    pub max_tries: u32,
}

impl DecryptionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password_delay(mut self, delay: Duration) -> Self {
        self.password_delay = delay;
        self
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Whether the retry budget is spent after `attempts` wrong passwords.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_tries != 0 && attempts >= self.max_tries
    }
}
