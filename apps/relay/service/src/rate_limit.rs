use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::store::{CounterKey, CounterScope, RelayStore, StoreError, WindowType};

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitCeilings {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

impl RateLimitCeilings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            per_minute: config.rate_limit_per_minute,
            per_hour: config.rate_limit_per_hour,
            per_day: config.rate_limit_per_day,
        }
    }

    const fn for_window(self, window: WindowType) -> u64 {
        match window {
            WindowType::Minute => self.per_minute,
            WindowType::Hour => self.per_hour,
            WindowType::Day => self.per_day,
        }
    }
}

/// Advisory headroom attached to admitted responses: the tenant-hour
/// window's limit, remaining slots, and reset time.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitAdvisory {
    pub limit: u64,
    pub remaining: u64,
    pub reset_epoch: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitExceeded {
    pub limit: u64,
    pub reset_epoch: i64,
    pub retry_after_seconds: i64,
}

#[derive(Debug, Clone, Copy)]
pub enum RateLimitOutcome {
    Admitted(RateLimitAdvisory),
    Limited(RateLimitExceeded),
}

/// Six ordered admission checks per request: tenant then credential, each
/// across the minute, hour, and day windows. Every check is one atomic
/// increment-and-read against the store; the first exceeded window aborts
/// admission. Windows are fixed-aligned, which allows up to twice the
/// nominal rate across a boundary; that tradeoff is intentional.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RelayStore>,
    defaults: RateLimitCeilings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RelayStore>, defaults: RateLimitCeilings) -> Self {
        Self { store, defaults }
    }

    pub async fn check(
        &self,
        tenant_id: &str,
        api_key_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        let ceilings = match self.store.tenant_limits(tenant_id).await? {
            Some(limits) => RateLimitCeilings {
                per_minute: limits.per_minute,
                per_hour: limits.per_hour,
                per_day: limits.per_day,
            },
            None => self.defaults,
        };

        let mut advisory = None;
        for (scope, scope_id) in [
            (CounterScope::Tenant, tenant_id),
            (CounterScope::ApiKey, api_key_id),
        ] {
            for window in [WindowType::Minute, WindowType::Hour, WindowType::Day] {
                let limit = ceilings.for_window(window);
                let window_start = window.window_start(now);
                let reset_epoch = window_start + window.duration_seconds();
                let key = CounterKey {
                    scope,
                    scope_id: scope_id.to_string(),
                    window,
                    window_start,
                };

                let count = self.store.increment_counter(&key).await?;
                if count > limit {
                    return Ok(RateLimitOutcome::Limited(RateLimitExceeded {
                        limit,
                        reset_epoch,
                        retry_after_seconds: (reset_epoch - now.timestamp()).max(1),
                    }));
                }

                if scope == CounterScope::Tenant && window == WindowType::Hour {
                    advisory = Some(RateLimitAdvisory {
                        limit,
                        remaining: limit - count,
                        reset_epoch,
                    });
                }
            }
        }

        // The tenant-hour check always runs before admission completes.
        let advisory = advisory.unwrap_or(RateLimitAdvisory {
            limit: ceilings.per_hour,
            remaining: 0,
            reset_epoch: WindowType::Hour.window_start(now) + WindowType::Hour.duration_seconds(),
        });
        Ok(RateLimitOutcome::Admitted(advisory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TenantLimits};

    fn limiter(store: &MemoryStore) -> RateLimiter {
        RateLimiter::new(
            Arc::new(store.clone()),
            RateLimitCeilings {
                per_minute: 20,
                per_hour: 100,
                per_day: 1000,
            },
        )
    }

    #[tokio::test]
    async fn twenty_first_request_in_a_minute_is_limited() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let now = Utc::now();

        for _ in 0..20 {
            let outcome = limiter.check("tenant-1", "key-1", now).await.expect("check");
            assert!(matches!(outcome, RateLimitOutcome::Admitted(_)));
        }

        let outcome = limiter.check("tenant-1", "key-1", now).await.expect("check");
        let RateLimitOutcome::Limited(exceeded) = outcome else {
            panic!("expected the 21st request to be limited");
        };
        assert_eq!(exceeded.limit, 20);
        assert!(exceeded.retry_after_seconds >= 1);
        assert!(exceeded.retry_after_seconds <= 60);
        assert_eq!(
            exceeded.reset_epoch,
            WindowType::Minute.window_start(now) + 60
        );
    }

    #[tokio::test]
    async fn next_minute_window_admits_again() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let now = Utc::now();

        for _ in 0..21 {
            let _ = limiter.check("tenant-1", "key-1", now).await.expect("check");
        }

        let next_window = now + chrono::Duration::seconds(60);
        let outcome = limiter
            .check("tenant-1", "key-1", next_window)
            .await
            .expect("check");
        assert!(matches!(outcome, RateLimitOutcome::Admitted(_)));
    }

    #[tokio::test]
    async fn advisory_reports_tenant_hour_headroom() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let now = Utc::now();

        let outcome = limiter.check("tenant-1", "key-1", now).await.expect("check");
        let RateLimitOutcome::Admitted(advisory) = outcome else {
            panic!("expected admission");
        };
        assert_eq!(advisory.limit, 100);
        assert_eq!(advisory.remaining, 99);
        assert_eq!(advisory.reset_epoch, WindowType::Hour.window_start(now) + 3600);
    }

    #[tokio::test]
    async fn tenant_overrides_replace_default_ceilings() {
        let store = MemoryStore::new();
        store
            .set_tenant_limits(
                "tenant-1",
                TenantLimits {
                    per_minute: 2,
                    per_hour: 100,
                    per_day: 1000,
                },
            )
            .await;
        let limiter = limiter(&store);
        let now = Utc::now();

        for _ in 0..2 {
            let outcome = limiter.check("tenant-1", "key-1", now).await.expect("check");
            assert!(matches!(outcome, RateLimitOutcome::Admitted(_)));
        }
        let outcome = limiter.check("tenant-1", "key-1", now).await.expect("check");
        assert!(matches!(outcome, RateLimitOutcome::Limited(_)));
    }

    #[tokio::test]
    async fn rejection_stops_later_counters_from_incrementing() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let now = Utc::now();

        for _ in 0..21 {
            let _ = limiter.check("tenant-1", "key-1", now).await.expect("check");
        }

        // The 21st request tripped the tenant-minute check, so the
        // credential-day counter saw only the 20 admitted passes.
        let key = CounterKey {
            scope: CounterScope::ApiKey,
            scope_id: "key-1".to_string(),
            window: WindowType::Day,
            window_start: WindowType::Day.window_start(now),
        };
        let count = store.increment_counter(&key).await.expect("increment");
        assert_eq!(count, 21);
    }

    #[tokio::test]
    async fn separate_credentials_share_the_tenant_ceiling() {
        let store = MemoryStore::new();
        store
            .set_tenant_limits(
                "tenant-1",
                TenantLimits {
                    per_minute: 3,
                    per_hour: 100,
                    per_day: 1000,
                },
            )
            .await;
        let limiter = limiter(&store);
        let now = Utc::now();

        for key in ["key-1", "key-2", "key-3"] {
            let outcome = limiter.check("tenant-1", key, now).await.expect("check");
            assert!(matches!(outcome, RateLimitOutcome::Admitted(_)));
        }

        // Fourth request from yet another credential still trips the
        // shared tenant-minute window.
        let outcome = limiter.check("tenant-1", "key-4", now).await.expect("check");
        assert!(matches!(outcome, RateLimitOutcome::Limited(_)));
    }
}
