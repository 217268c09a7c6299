//! Core sliding-window rate limiter.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace};

use crate::config::RateLimitPolicy;
use crate::error::{Result, WayfarerError};

use super::window::ClientWindow;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed. A slot was consumed.
    Admitted,
    /// The client is over its limit. Nothing was recorded.
    Rejected,
}

impl Decision {
    /// Whether the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }
}

/// A per-client sliding-window rate limiter.
///
/// Each client gets at most `max_requests` admissions within any trailing
/// window. The decision and the recording happen under one lock, so
/// concurrent requests from the same client can never over-admit.
///
/// This struct is thread-safe and is shared across tasks behind an `Arc`.
pub struct SlidingWindowLimiter {
    /// The admission policy applied to every client
    policy: RateLimitPolicy,
    /// Window state indexed by client identifier
    windows: Mutex<HashMap<String, ClientWindow>>,
}

impl SlidingWindowLimiter {
    /// Create a new limiter for the given policy.
    ///
    /// A zero `max_requests` or `window_secs` is rejected here rather than
    /// surfacing later as a limiter that blocks everything or nothing.
    pub fn new(policy: RateLimitPolicy) -> Result<Self> {
        if policy.max_requests == 0 {
            return Err(WayfarerError::Config(
                "rate limit policy requires max_requests > 0".to_string(),
            ));
        }
        if policy.window_secs == 0 {
            return Err(WayfarerError::Config(
                "rate limit policy requires window_secs > 0".to_string(),
            ));
        }
        Ok(Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        })
    }

    /// Decide whether a request from `client_id` at time `now` is admitted,
    /// and record it if so.
    ///
    /// Expired timestamps are pruned first, then the live count is compared
    /// against the policy ceiling. A rejected request consumes no slot: only
    /// admissions are recorded, so a client hammering a full window does not
    /// push its own recovery further out.
    pub fn check_and_record(&self, client_id: &str, now: Instant) -> Decision {
        trace!(client = client_id, "checking rate limit");

        let mut windows = self.windows.lock();

        let window = windows.entry(client_id.to_string()).or_insert_with(|| {
            debug!(client = client_id, "tracking new client");
            ClientWindow::new()
        });

        window.prune(now, self.policy.window());

        if window.len() >= self.policy.max_requests as usize {
            debug!(
                client = client_id,
                limit = self.policy.max_requests,
                window_secs = self.policy.window_secs,
                "rate limit exceeded"
            );
            return Decision::Rejected;
        }

        window.record(now);
        Decision::Admitted
    }

    /// [`check_and_record`](Self::check_and_record) against the current time.
    pub fn check(&self, client_id: &str) -> Decision {
        self.check_and_record(client_id, Instant::now())
    }

    /// Evict clients whose every timestamp has expired.
    ///
    /// Pruning is otherwise lazy and only touches clients that keep sending,
    /// so a client that goes quiet would pin its entry forever. Called
    /// periodically from a background task. Returns the number of clients
    /// evicted.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let window = self.policy.window();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| w.live_count(now, window) > 0);
        let evicted = before - windows.len();
        if evicted > 0 {
            debug!(evicted, remaining = windows.len(), "swept idle clients");
        }
        evicted
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.windows.lock().len()
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }
}
