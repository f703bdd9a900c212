//! The three public entry points: `scrape_info_hashes`,
//! `batch_scrape_info_hashes`, and the pure `find_max_seeders` reducer.
use crate::config::ScrapeConfig;
use crate::error::InfoHashError;
use crate::infohash::InfoHash;
use crate::stats::{ScrapeMap, TrackerStats};
use std::collections::HashMap;

/// Parses every hash up front, synchronously, before any network I/O: a
/// malformed hash is the one error this crate ever raises to a caller.
fn parse_hashes(info_hashes: &[String]) -> Result<Vec<(String, InfoHash)>, InfoHashError> {
    info_hashes
        .iter()
        .map(|hex| hex.parse::<InfoHash>().map(|ih| (hex.clone(), ih)))
        .collect()
}

/// Queries every tracker in `trackers` about every hash in `info_hashes`
/// (the cartesian product), concurrently, using `ScrapeConfig::default()`.
///
/// Returns a mapping containing every input hash as a key. A tracker that
/// fails (DNS, timeout, malformed reply, non-2xx/action=3) is silently
/// absent from that hash's list; the call itself only fails if an input
/// hash string is not valid 40-character hex.
pub async fn scrape_info_hashes(
    info_hashes: &[String],
    trackers: &[String],
) -> Result<ScrapeMap, InfoHashError> {
    scrape_info_hashes_with_config(info_hashes, trackers, &ScrapeConfig::default()).await
}

/// As [`scrape_info_hashes`], with caller-supplied timeouts and retry policy.
pub async fn scrape_info_hashes_with_config(
    info_hashes: &[String],
    trackers: &[String],
    config: &ScrapeConfig,
) -> Result<ScrapeMap, InfoHashError> {
    let hashes = parse_hashes(info_hashes)?;
    Ok(crate::scheduler::scrape_cartesian(&hashes, trackers, config).await)
}

/// Queries each tracker exactly once, with only the hashes that named it in
/// `items`, using `ScrapeConfig::default()`.
///
/// `items` is a sequence of `(hex_hash, trackers_for_that_hash)` pairs. The
/// reverse index (tracker -> hashes) is built internally so a tracker named
/// by several hashes is contacted only once.
pub async fn batch_scrape_info_hashes(
    items: &[(String, Vec<String>)],
) -> Result<ScrapeMap, InfoHashError> {
    batch_scrape_info_hashes_with_config(items, &ScrapeConfig::default()).await
}

/// As [`batch_scrape_info_hashes`], with caller-supplied timeouts and retry
/// policy.
pub async fn batch_scrape_info_hashes_with_config(
    items: &[(String, Vec<String>)],
    config: &ScrapeConfig,
) -> Result<ScrapeMap, InfoHashError> {
    let mut all_hashes = Vec::with_capacity(items.len());
    let mut by_tracker: HashMap<String, Vec<(String, InfoHash)>> = HashMap::new();
    for (hex, trackers) in items {
        let ih = hex.parse::<InfoHash>()?;
        all_hashes.push((hex.clone(), ih));
        for tracker in trackers {
            by_tracker
                .entry(tracker.clone())
                .or_default()
                .push((hex.clone(), ih));
        }
    }
    Ok(crate::scheduler::scrape_grouped(&all_hashes, by_tracker, config).await)
}

/// Pure reduction: for each hash, the maximum `seeders` across its
/// `TrackerStats` list, or `0` if the list is empty. Matches
/// `find_max_seeders` named in spec §4.4 — the thin post-processing utility
/// the rest of this crate treats as an external collaborator, implemented
/// here as a one-line reducer since it has no network or protocol content.
pub fn find_max_seeders(result: &ScrapeMap) -> HashMap<String, u32> {
    result
        .iter()
        .map(|(hex, stats)| {
            let max = stats.iter().map(|s| s.seeders).max().unwrap_or(0);
            (hex.clone(), max)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_hash_is_rejected_before_any_io() {
        let err = parse_hashes(&["xyz".to_string()]).unwrap_err();
        assert!(matches!(err, InfoHashError::WrongLength(3)));
    }

    #[tokio::test]
    async fn key_totality_for_empty_tracker_list() {
        let hashes = vec!["a".repeat(40), "b".repeat(40)];
        let result = scrape_info_hashes(&hashes, &[]).await.unwrap();
        assert_eq!(result.len(), 2);
        for h in &hashes {
            assert_eq!(result.get(h).unwrap().len(), 0);
        }
    }

    #[test]
    fn find_max_seeders_picks_the_max_and_defaults_to_zero() {
        let mut result: ScrapeMap = HashMap::new();
        result.insert(
            "a".repeat(40),
            vec![
                TrackerStats {
                    tracker_url: "udp://t1".into(),
                    seeders: 5,
                    peers: 1,
                    complete: 1,
                },
                TrackerStats {
                    tracker_url: "udp://t2".into(),
                    seeders: 12,
                    peers: 2,
                    complete: 3,
                },
            ],
        );
        result.insert("b".repeat(40), vec![]);

        let maxes = find_max_seeders(&result);
        assert_eq!(maxes[&"a".repeat(40)], 12);
        assert_eq!(maxes[&"b".repeat(40)], 0);
    }

    #[tokio::test]
    async fn batch_scrape_builds_reverse_index_per_tracker() {
        let items = vec![
            ("a".repeat(40), vec!["ftp://t1.example".to_string()]),
            ("b".repeat(40), vec!["ftp://t2.example".to_string()]),
        ];
        let result = batch_scrape_info_hashes(&items).await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[&"a".repeat(40)].is_empty());
        assert!(result[&"b".repeat(40)].is_empty());
    }
}
