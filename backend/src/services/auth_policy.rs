//! Expiry and pool-size decisions for sessions.
//!
//! Everything here is a pure function of timestamps and [`AuthPolicyConfig`].

use chrono::{DateTime, Duration, Utc};

use crate::config::AuthPolicyConfig;

#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    config: AuthPolicyConfig,
}

impl AuthPolicy {
    pub fn new(config: AuthPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthPolicyConfig {
        &self.config
    }

    pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now > expires_at
    }

    pub fn within_rolling_window(
        last_used_at: DateTime<Utc>,
        now: DateTime<Utc>,
        rolling_ttl: Duration,
    ) -> bool {
        now - last_used_at <= rolling_ttl
    }

    /// Expiry is always measured from `now`, so each renewal slides the window.
    pub fn next_expiry(now: DateTime<Utc>, absolute_ttl: Duration) -> DateTime<Utc> {
        now + absolute_ttl
    }

    /// Oldest sessions to drop so one more fits under `max_sessions`.
    pub fn eviction_count(current_session_count: usize, max_sessions: usize) -> usize {
        (current_session_count + 1).saturating_sub(max_sessions)
    }

    pub fn access_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Self::next_expiry(now, self.config.token_ttl)
    }

    pub fn refresh_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Self::next_expiry(now, self.config.refresh_token_ttl)
    }

    pub fn evictions_for(&self, current_session_count: usize) -> usize {
        Self::eviction_count(current_session_count, self.config.max_tokens_per_user)
    }

    pub fn is_idle(&self, last_used_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        !Self::within_rolling_window(last_used_at, now, self.config.token_rolling_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn expiry_is_strictly_after() {
        assert!(!AuthPolicy::is_expired(at(10), at(9)));
        assert!(!AuthPolicy::is_expired(at(10), at(10)));
        assert!(AuthPolicy::is_expired(at(10), at(11)));
    }

    #[test]
    fn rolling_window_is_inclusive() {
        let ttl = Duration::seconds(60);
        assert!(AuthPolicy::within_rolling_window(at(0), at(60), ttl));
        assert!(!AuthPolicy::within_rolling_window(at(0), at(61), ttl));
    }

    #[test]
    fn next_expiry_slides_from_now() {
        let ttl = Duration::hours(1);
        let first = AuthPolicy::next_expiry(at(0), ttl);
        let second = AuthPolicy::next_expiry(at(600), ttl);
        assert_eq!(first, at(3600));
        assert_eq!(second, at(4200));
        assert!(second >= first);
    }

    #[test]
    fn eviction_count_makes_room_for_one() {
        assert_eq!(AuthPolicy::eviction_count(0, 3), 0);
        assert_eq!(AuthPolicy::eviction_count(2, 3), 0);
        assert_eq!(AuthPolicy::eviction_count(3, 3), 1);
        assert_eq!(AuthPolicy::eviction_count(5, 3), 3);
        assert_eq!(AuthPolicy::eviction_count(1, 1), 1);
    }

    #[test]
    fn configured_helpers_use_policy_values() {
        let policy = AuthPolicy::new(AuthPolicyConfig {
            token_size_in_bytes: 32,
            token_ttl: Duration::minutes(10),
            token_rolling_ttl: Duration::minutes(5),
            refresh_token_ttl: Duration::days(1),
            max_tokens_per_user: 2,
        });
        assert_eq!(policy.access_expiry(at(0)), at(600));
        assert_eq!(policy.refresh_expiry(at(0)), at(86_400));
        assert_eq!(policy.evictions_for(2), 1);
        assert!(!policy.is_idle(at(0), at(300)));
        assert!(policy.is_idle(at(0), at(301)));
    }
}
