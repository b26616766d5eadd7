use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use actix_web::HttpRequest;
use anyhow::anyhow;
use moka::{
    Expiry,
    ops::compute::Op,
    sync::Cache,
};

/// `limit` requests per `window`. Parses from `"limit/window_ms"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u32, window_ms: u64) -> Self {
        Self {
            limit,
            window: Duration::from_millis(window_ms),
        }
    }
}

impl FromStr for RateLimitPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, window_ms) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("expected `limit/window_ms`"))?;

        let limit: u32 = limit.trim().parse()?;
        let window_ms: u64 = window_ms.trim().parse()?;
        if window_ms == 0 {
            return Err(anyhow!("window must be positive"));
        }

        Ok(Self::new(limit, window_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// Evicts each window once its reset time has passed.
struct WindowExpiry;

impl Expiry<String, Window> for WindowExpiry {
    fn expire_after_create(&self, _key: &String, window: &Window, created_at: Instant) -> Option<Duration> {
        Some(window.resets_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        window: &Window,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(window.resets_at.saturating_duration_since(updated_at))
    }
}

/// Fixed-window counters keyed by caller. One instance is shared by the whole server.
pub struct FixedWindowLimiter {
    windows: Cache<String, Window>,
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self {
            windows: Cache::builder()
                .max_capacity(100_000)
                .expire_after(WindowExpiry)
                .build(),
        }
    }

    pub fn check(&self, key: &str, policy: RateLimitPolicy) -> RateDecision {
        self.check_at(key, policy, Instant::now())
    }

    pub fn check_at(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateDecision {
        let mut decision = RateDecision::Limited {
            retry_after: policy.window,
        };

        // The entry is locked for the closure, so concurrent callers cannot both take the last slot.
        self.windows
            .entry(key.to_string())
            .and_compute_with(|current| match current.map(|entry| entry.into_value()) {
                Some(window) if now < window.resets_at => {
                    if window.count >= policy.limit {
                        decision = RateDecision::Limited {
                            retry_after: window.resets_at - now,
                        };
                        Op::Nop
                    } else {
                        let count = window.count + 1;
                        decision = RateDecision::Allowed {
                            remaining: policy.limit - count,
                        };
                        Op::Put(Window { count, ..window })
                    }
                }
                _ if policy.limit == 0 => Op::Nop,
                _ => {
                    decision = RateDecision::Allowed {
                        remaining: policy.limit - 1,
                    };
                    Op::Put(Window {
                        count: 1,
                        resets_at: now + policy.window,
                    })
                }
            });

        decision
    }

    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.windows.iter().count()
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
pub fn client_identifier(req: &HttpRequest) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const POLICY: RateLimitPolicy = RateLimitPolicy::new(3, 1_000);

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = FixedWindowLimiter::new();
        let t0 = Instant::now();

        assert_eq!(
            limiter.check_at("ip", POLICY, t0),
            RateDecision::Allowed { remaining: 2 }
        );
        assert_eq!(
            limiter.check_at("ip", POLICY, t0),
            RateDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("ip", POLICY, t0),
            RateDecision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check_at("ip", POLICY, t0 + Duration::from_millis(400)),
            RateDecision::Limited {
                retry_after: Duration::from_millis(600)
            }
        );
    }

    #[test]
    fn window_resets_after_interval() {
        let limiter = FixedWindowLimiter::new();
        let t0 = Instant::now();

        for _ in 0..3 {
            limiter.check_at("ip", POLICY, t0);
        }
        assert!(matches!(
            limiter.check_at("ip", POLICY, t0 + Duration::from_millis(999)),
            RateDecision::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at("ip", POLICY, t0 + Duration::from_millis(1_000)),
            RateDecision::Allowed { remaining: 2 }
        );
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new();
        let t0 = Instant::now();
        let one = RateLimitPolicy::new(1, 1_000);

        assert!(matches!(
            limiter.check_at("email:1.1.1.1", one, t0),
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("email:2.2.2.2", one, t0),
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("email:1.1.1.1", one, t0),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn zero_limit_always_blocks() {
        let limiter = FixedWindowLimiter::new();
        assert!(matches!(
            limiter.check("ip", RateLimitPolicy::new(0, 1_000)),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn windows_leave_the_store_after_reset() {
        let limiter = FixedWindowLimiter::new();

        limiter.check("short", RateLimitPolicy::new(5, 50));
        limiter.check("long", RateLimitPolicy::new(5, 60_000));
        assert_eq!(limiter.tracked_keys(), 2);

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_callers_share_one_budget() {
        let limiter = std::sync::Arc::new(FixedWindowLimiter::new());
        let policy = RateLimitPolicy::new(10, 60_000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| {
                            matches!(limiter.check("shared", policy), RateDecision::Allowed { .. })
                        })
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn parses_policy_strings() {
        assert_eq!(
            "5/900000".parse::<RateLimitPolicy>().unwrap(),
            RateLimitPolicy::new(5, 900_000)
        );
        assert!("5".parse::<RateLimitPolicy>().is_err());
        assert!("5/0".parse::<RateLimitPolicy>().is_err());
    }

    #[test]
    fn identifies_client_by_forwarded_header() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "10.0.0.7, 172.16.0.1"))
            .to_http_request();
        assert_eq!(client_identifier(&req), "10.0.0.7");

        let req = TestRequest::default()
            .peer_addr("192.168.1.20:5555".parse().unwrap())
            .to_http_request();
        assert_eq!(client_identifier(&req), "192.168.1.20");
    }
}
