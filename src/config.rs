//! Tunables for a scrape call: timeouts, retry schedule, and batch size.
//!
//! Kept as a plain struct with `Default` rather than a fluent builder —
//! the crate this library started from never reaches for a builder either,
//! preferring plain structs constructed with field syntax.
use std::time::Duration;

/// Configuration for a single `scrape_info_hashes`/`batch_scrape_info_hashes`
/// call. Use `ScrapeConfig::default()` unless a caller has a specific reason
/// to tune timeouts or the UDP retransmission schedule.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Total timeout for one HTTP scrape GET.
    pub http_timeout: Duration,
    /// Timeout waiting for a single UDP connect/scrape reply before the next
    /// retransmission is sent.
    pub udp_connect_timeout: Duration,
    /// Delays before each UDP retransmission. The length of this vector
    /// bounds the number of retries; exhausting it without a valid reply is
    /// a per-tracker timeout. Tightened from BEP 15's `15 * 2^n` schedule to
    /// fit comfortably within `overall_timeout`.
    pub udp_retry_schedule: Vec<Duration>,
    /// Maximum info hashes per UDP scrape datagram (BEP 15 caps this at 74
    /// to keep requests under typical MTU).
    pub udp_max_batch: usize,
    /// How long a connection id stays valid before a scrape must re-run the
    /// connect handshake.
    pub udp_connection_id_ttl: Duration,
    /// Deadline for an entire per-tracker scrape call (connect + all scrape
    /// batches), applied by the scheduler around each tracker task.
    pub overall_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            http_timeout: Duration::from_secs(10),
            udp_connect_timeout: Duration::from_secs(2),
            udp_retry_schedule: vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ],
            udp_max_batch: 74,
            udp_connection_id_ttl: Duration::from_secs(60),
            overall_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_batch_matches_bep15_ceiling() {
        assert_eq!(ScrapeConfig::default().udp_max_batch, 74);
    }
}
