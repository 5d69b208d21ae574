use super::*;

const PER_KEY_LIMIT: usize = 3;
const PER_KEY_WINDOW: Duration = Duration::from_secs(60);
const GLOBAL_LIMIT: usize = 5;

fn limiter() -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        per_key_limit: PER_KEY_LIMIT,
        per_key_window: PER_KEY_WINDOW,
        global_limit: GLOBAL_LIMIT,
        global_window: Duration::from_secs(60),
    })
}

#[test]
fn per_key_allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    for i in 0..PER_KEY_LIMIT {
        assert!(rl.check_and_record_at("a@example.com", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("a@example.com", now),
        Err(RateLimitError::PerKeyExceeded { limit: PER_KEY_LIMIT, window_secs: 60 })
    ));
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    for i in 0..GLOBAL_LIMIT {
        assert!(rl.check_and_record_at(&format!("user-{i}"), now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("user-new", now),
        Err(RateLimitError::GlobalExceeded { limit: GLOBAL_LIMIT, .. })
    ));
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter();
    let start = Instant::now();

    for _ in 0..PER_KEY_LIMIT {
        rl.check_and_record_at("k", start).unwrap();
    }
    assert!(rl.check_and_record_at("k", start).is_err());

    let after_window = start + PER_KEY_WINDOW + Duration::from_millis(1);
    assert!(rl.check_and_record_at("k", after_window).is_ok());
}

#[test]
fn distinct_keys_do_not_interfere() {
    let rl = limiter();
    let now = Instant::now();

    for _ in 0..PER_KEY_LIMIT {
        rl.check_and_record_at("a", now).unwrap();
    }
    assert!(rl.check_and_record_at("a", now).is_err());
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn rejected_requests_are_not_recorded() {
    let rl = limiter();
    let start = Instant::now();

    for _ in 0..PER_KEY_LIMIT {
        rl.check_and_record_at("k", start).unwrap();
    }
    for _ in 0..10 {
        assert!(rl.check_and_record_at("k", start).is_err());
    }
    // Only the accepted requests count toward the global window.
    assert!(rl.check_and_record_at("other", start).is_ok());
    assert!(rl.check_and_record_at("other", start).is_ok());
    assert!(rl.check_and_record_at("third", start).is_err());
}

#[test]
fn idle_keys_are_forgotten() {
    let rl = limiter();
    let start = Instant::now();
    rl.check_and_record_at("idle", start).unwrap();

    let later = start + PER_KEY_WINDOW + Duration::from_secs(1);
    rl.check_and_record_at("active", later).unwrap();

    let inner = rl.inner.lock().unwrap();
    assert!(!inner.key_requests.contains_key("idle"));
    assert!(inner.key_requests.contains_key("active"));
}

#[test]
fn clones_share_state() {
    let rl = limiter();
    let clone = rl.clone();
    let now = Instant::now();
    for _ in 0..PER_KEY_LIMIT {
        clone.check_and_record_at("k", now).unwrap();
    }
    assert!(rl.check_and_record_at("k", now).is_err());
}

#[test]
fn retry_after_reports_window() {
    let err = RateLimitError::PerKeyExceeded { limit: 5, window_secs: 900 };
    assert_eq!(err.retry_after_secs(), 900);
}

#[test]
fn default_limiters_use_builtin_limits() {
    let login = RateLimiter::login().config();
    assert!(login.per_key_limit >= 1);
    assert!(login.per_key_window >= Duration::from_secs(1));
    let checkout = RateLimiter::checkout().config();
    assert!(checkout.global_limit >= checkout.per_key_limit);
}
