use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Requests-per-minute token bucket shared by every clone
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    requests_per_min: u64,
    // (available tokens, time of last refill)
    tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    /// `0` disables limiting
    pub fn new(requests_per_min: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                requests_per_min,
                tokens: Mutex::new((requests_per_min as f64, Instant::now())),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Wait until one request may be sent
    pub async fn acquire(&self) {
        if self.inner.requests_per_min == 0 {
            return;
        }
        let capacity = self.inner.requests_per_min as f64;
        let refill_rate = capacity / 60.0;
        loop {
            let mut guard = self.inner.tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            *tokens = (*tokens + now.duration_since(*last).as_secs_f64() * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                return;
            }
            let wait = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(wait.max(0.001))).await;
        }
    }
}
