use std::future::Future;
use std::time::Duration;

/// Returned by [with_retries] when every attempt failed.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("gave up after {attempts} attempts: {last_error}")]
pub struct RetriesExhausted<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[error(source)]
    pub last_error: E,
}

/// Run `f` until it succeeds or `max_attempts` have been made, sleeping `delay` between attempts.
///
/// The closure receives the 1-based attempt number. There is no sleep after the final attempt.
/// A `max_attempts` of 0 is treated as a single attempt.
pub async fn with_retries<T, E, F, Fut>(
    max_attempts: u32,
    delay: Duration,
    mut f: F,
) -> Result<T, RetriesExhausted<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                return Err(RetriesExhausted {
                    attempts: attempt,
                    last_error: e,
                })
            }
            Err(e) => {
                log::debug!("Attempt {attempt} of {max_attempts} failed: {e}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
