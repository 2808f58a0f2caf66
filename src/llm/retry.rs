//! Retry policy for reasoning-service requests.

use std::time::Duration;

/// Attempts beyond the first request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const BASE_DELAY_MS: u64 = 250;
const MAX_DELAY: Duration = Duration::from_secs(10);

/// HTTP statuses worth retrying: timeouts, throttling, and server-side
/// hiccups. 529 is the Anthropic overloaded status.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

/// Exponential backoff: 250ms doubling per attempt, capped at 10s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.min(6);
    let delay = Duration::from_millis(BASE_DELAY_MS.saturating_mul(1 << exp));
    delay.min(MAX_DELAY)
}
