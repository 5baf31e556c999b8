//! Per-user throttle on TOTP codes at login.
//!
//! The second login step is keyed by user id, not by client address, so a
//! guesser rotating addresses still draws from one budget per account.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use mercato_core::UserId;

/// Attempts allowed back to back before the throttle engages.
const BURST: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);

/// One attempt is restored per TOTP step.
pub const REPLENISH_PERIOD: Duration = Duration::from_secs(30);

/// Above this many tracked users, idle entries are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// Budget of TOTP code attempts per user: a burst of 5, then one every 30 s.
pub struct CodeAttemptLimiter {
    limiter: DefaultKeyedRateLimiter<UserId>,
}

impl CodeAttemptLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        // Two per minute is one per REPLENISH_PERIOD.
        let quota = Quota::per_minute(NonZeroU32::MIN.saturating_add(1)).allow_burst(BURST);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Spend one attempt for `user_id`. Returns `false` once the budget is
    /// exhausted.
    pub fn try_acquire(&self, user_id: UserId) -> bool {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&user_id).is_ok()
    }
}

impl Default for CodeAttemptLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_per_user() {
        let limiter = CodeAttemptLimiter::new();
        let ada = UserId::new(1);
        let grace = UserId::new(2);

        for _ in 0..BURST.get() {
            assert!(limiter.try_acquire(ada));
        }
        assert!(!limiter.try_acquire(ada));
        assert!(limiter.try_acquire(grace));
    }
}
