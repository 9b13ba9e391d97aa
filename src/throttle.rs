//! Minimum-interval gate between successive calls to one external service.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Enforces a minimum delay between the starts of consecutive requests.
///
/// The interval runs from one request start to the next, so a response
/// slower than the interval is followed immediately. The first call never
/// waits.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep until `interval` has elapsed since the previous call, then
    /// record this call as the latest request.
    pub async fn wait(&self) {
        let remaining = {
            let last = self.last_request.lock().ok().and_then(|l| *l);
            last.and_then(|t| self.interval.checked_sub(t.elapsed()))
        };

        if let Some(remaining) = remaining.filter(|d| !d.is_zero()) {
            debug!(wait_ms = remaining.as_millis() as u64, "Throttling request");
            tokio::time::sleep(remaining).await;
        }

        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(Instant::now());
        }
    }
}
