use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct Limits {
    pub requests_per_min: u64,
    /// Requests allowed back to back before the refill rate applies.
    pub burst: u32,
}

impl Limits {
    pub fn per_minute(requests_per_min: u64) -> Self {
        Self {
            requests_per_min,
            burst: 1,
        }
    }
}

/// Token bucket shared by clones; callers await until a request slot is free.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // (available tokens, time of last refill)
    tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let capacity = f64::from(limits.burst.max(1));
        Self {
            inner: Arc::new(Inner {
                limits,
                tokens: Mutex::new((capacity, Instant::now())),
            }),
        }
    }

    /// Wait for one request slot. A zero rate disables limiting.
    pub async fn acquire(&self) {
        let rpm = self.inner.limits.requests_per_min;
        if rpm == 0 {
            return;
        }
        let capacity = f64::from(self.inner.limits.burst.max(1));
        let refill_rate = rpm as f64 / 60.0; // tokens per second
        loop {
            let mut guard = self.inner.tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
