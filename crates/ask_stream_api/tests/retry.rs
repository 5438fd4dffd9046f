use std::time::Duration;

use ask_stream_api::retry::{RetryPolicy, BACKOFF_MS, MAX_RETRIES};

#[test]
fn retry_default_policy_allows_three_retries_with_fixed_backoff() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, MAX_RETRIES);
    assert_eq!(policy.max_attempts(), 4);
    assert_eq!(policy.delay(0), Duration::from_millis(BACKOFF_MS));
    assert_eq!(policy.delay(2), Duration::from_millis(BACKOFF_MS));
}

#[test]
fn retry_should_retry_stops_after_budget() {
    let policy = RetryPolicy::new(2, Duration::from_millis(5));
    assert!(policy.should_retry(0));
    assert!(policy.should_retry(1));
    assert!(!policy.should_retry(2));
}

#[test]
fn retry_zero_retries_means_single_attempt() {
    let policy = RetryPolicy::new(0, Duration::ZERO);
    assert_eq!(policy.max_attempts(), 1);
    assert!(!policy.should_retry(0));
}
