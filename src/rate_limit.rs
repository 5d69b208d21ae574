//! In-memory rate limiting for login codes and checkout.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`.
//! Each limiter enforces two limits:
//! - Per-key: e.g. 5 login-code requests per email per 15 minutes
//! - Global: a ceiling across all keys, protecting the mailer and gateway
//!
//! TRADE-OFFS
//! ==========
//! State is per-process, so multiple replicas each allow the full quota.
//! Idle keys are swept out whenever a request is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::env_parse;

const DEFAULT_LOGIN_PER_KEY_LIMIT: usize = 5;
const DEFAULT_LOGIN_PER_KEY_WINDOW_SECS: u64 = 900;
const DEFAULT_LOGIN_GLOBAL_LIMIT: usize = 100;
const DEFAULT_LOGIN_GLOBAL_WINDOW_SECS: u64 = 60;

const DEFAULT_CHECKOUT_PER_KEY_LIMIT: usize = 10;
const DEFAULT_CHECKOUT_PER_KEY_WINDOW_SECS: u64 = 60;
const DEFAULT_CHECKOUT_GLOBAL_LIMIT: usize = 300;
const DEFAULT_CHECKOUT_GLOBAL_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_key_limit: usize,
    pub per_key_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
}

impl RateLimitConfig {
    /// Read `RATE_LIMIT_{prefix}_PER_KEY`, `..._PER_KEY_WINDOW_SECS`,
    /// `..._GLOBAL` and `..._GLOBAL_WINDOW_SECS`, falling back to `defaults`.
    fn from_env(prefix: &str, defaults: Self) -> Self {
        let per_key_window_secs = env_parse(
            &format!("RATE_LIMIT_{prefix}_PER_KEY_WINDOW_SECS"),
            defaults.per_key_window.as_secs(),
        );
        let global_window_secs = env_parse(
            &format!("RATE_LIMIT_{prefix}_GLOBAL_WINDOW_SECS"),
            defaults.global_window.as_secs(),
        );
        Self {
            per_key_limit: env_parse(&format!("RATE_LIMIT_{prefix}_PER_KEY"), defaults.per_key_limit),
            per_key_window: Duration::from_secs(per_key_window_secs),
            global_limit: env_parse(&format!("RATE_LIMIT_{prefix}_GLOBAL"), defaults.global_limit),
            global_window: Duration::from_secs(global_window_secs),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("too many requests (max {limit} per {window_secs}s)")]
    PerKeyExceeded { limit: usize, window_secs: u64 },
    #[error("service is busy (max {limit} requests per {window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
}

impl RateLimitError {
    /// Seconds until the window that tripped the limit fully resets.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::PerKeyExceeded { window_secs, .. } | Self::GlobalExceeded { window_secs, .. } => *window_secs,
        }
    }
}

impl crate::error::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

struct RateLimiterInner {
    /// Per-key request timestamps.
    key_requests: HashMap<String, VecDeque<Instant>>,
    /// Global request timestamps.
    global_requests: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                key_requests: HashMap::new(),
                global_requests: VecDeque::new(),
            })),
            config,
        }
    }

    /// Limiter for login-code requests, keyed by normalized email.
    #[must_use]
    pub fn login() -> Self {
        Self::new(RateLimitConfig::from_env(
            "LOGIN",
            RateLimitConfig {
                per_key_limit: DEFAULT_LOGIN_PER_KEY_LIMIT,
                per_key_window: Duration::from_secs(DEFAULT_LOGIN_PER_KEY_WINDOW_SECS),
                global_limit: DEFAULT_LOGIN_GLOBAL_LIMIT,
                global_window: Duration::from_secs(DEFAULT_LOGIN_GLOBAL_WINDOW_SECS),
            },
        ))
    }

    /// Limiter for checkout attempts, keyed by user id.
    #[must_use]
    pub fn checkout() -> Self {
        Self::new(RateLimitConfig::from_env(
            "CHECKOUT",
            RateLimitConfig {
                per_key_limit: DEFAULT_CHECKOUT_PER_KEY_LIMIT,
                per_key_window: Duration::from_secs(DEFAULT_CHECKOUT_PER_KEY_WINDOW_SECS),
                global_limit: DEFAULT_CHECKOUT_GLOBAL_LIMIT,
                global_window: Duration::from_secs(DEFAULT_CHECKOUT_GLOBAL_WINDOW_SECS),
            },
        ))
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Check both per-key and global limits, then record the request.
    ///
    /// # Errors
    ///
    /// Returns which limit was hit; nothing is recorded in that case.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let inner = &mut *guard;
        let cfg = self.config;

        prune_window(&mut inner.global_requests, now, cfg.global_window);
        if inner.global_requests.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: cfg.global_limit,
                window_secs: cfg.global_window.as_secs(),
            });
        }

        let key_deque = inner.key_requests.entry(key.to_owned()).or_default();
        prune_window(key_deque, now, cfg.per_key_window);
        if key_deque.len() >= cfg.per_key_limit {
            return Err(RateLimitError::PerKeyExceeded {
                limit: cfg.per_key_limit,
                window_secs: cfg.per_key_window.as_secs(),
            });
        }

        key_deque.push_back(now);
        inner.global_requests.push_back(now);

        // Forget keys that have gone quiet.
        let per_key_window = cfg.per_key_window;
        inner.key_requests.retain(|_, deque| {
            deque.back().is_some_and(|&last| now.duration_since(last) <= per_key_window)
        });

        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
