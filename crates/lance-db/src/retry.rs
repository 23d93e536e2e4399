use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::DbError;

/// Run `op` up to `max_attempts` times, sleeping a fixed `delay` between
/// attempts. Only transient (network) failures are retried; anything else is
/// returned immediately.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, delay: Duration, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!("Transient failure (attempt {}/{}): {}", attempt, max_attempts, e);
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
