//! Fan-out scheduler: groups work by tracker, dispatches HTTP/UDP scrapes
//! concurrently, applies a per-tracker timeout, and merges results keyed by
//! info hash.
//!
//! Grounded in the teacher's `tracker::Client` as the "one client type, one
//! entry method" shape, generalized here from a single announce call into a
//! fan-out over many tracker tasks via `tokio::task::JoinSet`.
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::infohash::InfoHash;
use crate::stats::{ScrapeMap, TrackerStats};
use std::collections::HashMap;
use url::Url;

async fn dispatch(
    tracker_url: &str,
    hashes: &[InfoHash],
    config: &ScrapeConfig,
) -> Result<Vec<TrackerStats>, ScrapeError> {
    let scheme = Url::parse(tracker_url)?.scheme().to_string();
    match scheme.as_str() {
        "http" | "https" => crate::http::scrape(tracker_url, hashes, config).await,
        "udp" => crate::udp::scrape(tracker_url, hashes, config).await,
        other => Err(ScrapeError::UnsupportedScheme(other.to_string())),
    }
}

/// Runs `dispatch` under `config.overall_timeout`, logging and degrading any
/// failure (including a blown deadline) to an empty list: a caller of the
/// scheduler never sees a per-tracker error, only an absent contribution.
#[tracing::instrument(skip(hashes, config), fields(tracker = %tracker_url))]
async fn scrape_one_tracker_bounded(
    tracker_url: String,
    hashes: Vec<InfoHash>,
    config: ScrapeConfig,
) -> Vec<TrackerStats> {
    let timeout = config.overall_timeout;
    match tokio::time::timeout(timeout, dispatch(&tracker_url, &hashes, &config)).await {
        Ok(Ok(stats)) => stats,
        Ok(Err(err)) => {
            tracing::warn!(tracker = %tracker_url, error = %err, "tracker scrape failed");
            Vec::new()
        }
        Err(_elapsed) => {
            tracing::warn!(tracker = %tracker_url, "tracker scrape timed out");
            Vec::new()
        }
    }
}

/// Groups `hashes` and `trackers` as a cartesian product (every tracker
/// queried with every hash), dispatches concurrently, and merges into a
/// `ScrapeMap` that contains every input hash as a key.
pub(crate) async fn scrape_cartesian(
    hashes: &[(String, InfoHash)],
    trackers: &[String],
    config: &ScrapeConfig,
) -> ScrapeMap {
    let groups: Vec<(String, Vec<(String, InfoHash)>)> = trackers
        .iter()
        .map(|t| (t.clone(), hashes.to_vec()))
        .collect();
    dispatch_groups(hashes, groups, config).await
}

/// Groups by tracker from a reverse index (tracker -> hashes that named it)
/// so each tracker is queried exactly once with only its relevant subset.
pub(crate) async fn scrape_grouped(
    all_hashes: &[(String, InfoHash)],
    groups: HashMap<String, Vec<(String, InfoHash)>>,
    config: &ScrapeConfig,
) -> ScrapeMap {
    let groups: Vec<_> = groups.into_iter().collect();
    dispatch_groups(all_hashes, groups, config).await
}

async fn dispatch_groups(
    all_hashes: &[(String, InfoHash)],
    groups: Vec<(String, Vec<(String, InfoHash)>)>,
    config: &ScrapeConfig,
) -> ScrapeMap {
    let mut result: ScrapeMap = all_hashes
        .iter()
        .map(|(hex, _)| (hex.clone(), Vec::new()))
        .collect();

    let mut tasks = tokio::task::JoinSet::new();
    for (tracker_url, hashes) in groups {
        let config = config.clone();
        let raw_hashes: Vec<InfoHash> = hashes.iter().map(|(_, h)| *h).collect();
        tasks.spawn(async move {
            let stats = scrape_one_tracker_bounded(tracker_url.clone(), raw_hashes, config).await;
            (tracker_url, hashes, stats)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let Ok((tracker_url, hashes, stats)) = joined else {
            // A panicking task is isolated: it contributes nothing, but
            // cannot take down the rest of the fan-out.
            continue;
        };
        for ((hex, _), mut stat) in hashes.into_iter().zip(stats) {
            stat.tracker_url = tracker_url.clone();
            result.entry(hex).or_default().push(stat);
        }
    }

    result
}
