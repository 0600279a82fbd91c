//! Retry with exponential backoff for provider HTTP calls.

use std::thread;
use std::time::Duration;

/// Default delays between attempts: 1s, 2s, 4s.
pub const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Errors that can tell whether another attempt might succeed.
pub trait Transient {
    /// Returns `true` for errors worth retrying (network failures, timeouts,
    /// HTTP 5xx). Client errors and malformed responses return `false`.
    fn is_transient(&self) -> bool;
}

/// Runs `f`, retrying transient failures once per entry in `delays`.
///
/// Sleeps for each delay before the corresponding retry, so the operation is
/// attempted at most `delays.len() + 1` times. Non-transient errors are
/// returned immediately.
///
/// # Returns
///
/// The first success, or the last error once retries are exhausted.
pub fn retry_with_backoff<F, T, E>(delays: &[Duration], mut f: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Transient + std::fmt::Display,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !e.is_transient() => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in delays.iter().enumerate() {
        tracing::debug!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "retrying after transient failure"
        );
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Returns `true` for HTTP status codes in the 5xx range.
pub(crate) fn is_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}
