//! Process-local fixed-window rate limiting keyed by client address.
//!
//! State lives in memory and resets on restart; there is no cross-instance
//! coordination. The table is unbounded at this scope (see DESIGN.md).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u32,
    reset_at: Instant,
}

pub const WINDOW: Duration = Duration::from_secs(60);
pub const MAX_REQUESTS: u32 = 5;

pub struct RateLimiter {
    records: Mutex<HashMap<String, WindowRecord>>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MAX_REQUESTS, WINDOW)
    }

    /// Admit or reject a request for `key`. The read-check-increment happens
    /// under the table lock so concurrent bursts cannot undercount.
    pub async fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now()).await
    }

    async fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut records = self.records.lock().await;
        match records.get_mut(key) {
            Some(record) if now < record.reset_at => {
                if record.count >= self.max_requests {
                    return false;
                }
                record.count += 1;
                true
            }
            _ => {
                records.insert(
                    key.to_string(),
                    WindowRecord {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}
