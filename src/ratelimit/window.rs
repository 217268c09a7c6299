//! Per-client sliding window state.

use std::time::{Duration, Instant};

/// Request timestamps for a single client.
///
/// The window "slides": a timestamp counts against the client until it is
/// `window` old, at which point it expires. Expired timestamps are pruned
/// lazily on every touch, so the vector only ever holds live entries plus
/// whatever expired since the last touch.
#[derive(Debug, Default)]
pub struct ClientWindow {
    /// Admission timestamps, oldest first
    timestamps: Vec<Instant>,
}

impl ClientWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    /// Drop timestamps that have aged out of the window.
    ///
    /// A timestamp exactly `window` old is expired: the comparison is
    /// strict, so a request admitted at `t` frees its slot at `t + window`.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        self.timestamps.retain(|&t| now.duration_since(t) < window);
    }

    /// Number of live timestamps. Only meaningful after [`prune`](Self::prune).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds no live timestamps.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Record an admission at `now`.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push(now);
    }

    /// Count timestamps still inside the window without mutating.
    pub fn live_count(&self, now: Instant, window: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|&&t| now.duration_since(t) < window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_removes_expired() {
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        let mut w = ClientWindow::new();
        w.record(t0);
        w.record(t0 + Duration::from_secs(30));

        w.prune(t0 + Duration::from_secs(59), window);
        assert_eq!(w.len(), 2);

        // t0 is exactly 60s old here and must expire
        w.prune(t0 + Duration::from_secs(60), window);
        assert_eq!(w.len(), 1);

        w.prune(t0 + Duration::from_secs(120), window);
        assert!(w.is_empty());
    }

    #[test]
    fn test_live_count_does_not_mutate() {
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        let mut w = ClientWindow::new();
        w.record(t0);

        assert_eq!(w.live_count(t0 + Duration::from_secs(61), window), 0);
        // The expired timestamp is still stored until the next prune
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_identical_timestamps_all_count() {
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        let mut w = ClientWindow::new();
        w.record(t0);
        w.record(t0);
        w.record(t0);

        w.prune(t0, window);
        assert_eq!(w.len(), 3);
    }
}
