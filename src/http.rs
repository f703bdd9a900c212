//! The HTTP scrape client (BEP 48 / BEP 3 scrape convention).
//!
//! Grounded in `tracker::Client::announce` from the crate this library
//! started from: build a URL with query parameters, issue a `reqwest` GET,
//! parse the bencoded body.
use crate::bencode::BencodeValue;
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::infohash::InfoHash;
use crate::stats::TrackerStats;
use url::Url;

/// Rewrites a tracker URL's path from `.../announce` to `.../scrape`,
/// per the scrape convention. A tracker whose path has no `announce`
/// component is left as-is: the caller gets whatever that URL returns,
/// and a tracker that doesn't implement scrape surfaces as a per-tracker
/// failure (bad status or unparseable body), not as an error here.
fn scrape_url(announce_url: &str) -> Result<Url, ScrapeError> {
    let mut url = Url::parse(announce_url)?;
    if url.path().ends_with("/announce") {
        let new_path = {
            let path = url.path();
            format!("{}scrape", &path[..path.len() - "announce".len()])
        };
        url.set_path(&new_path);
    }
    Ok(url)
}

/// Issues one HTTP scrape GET for `hashes` against `announce_url`, returning
/// one `TrackerStats` per hash present in the response's `files` dictionary.
/// Hashes absent from `files` simply produce no record — this is not an
/// error, per spec.
#[tracing::instrument(skip(hashes, config), fields(tracker = %announce_url))]
pub(crate) async fn scrape(
    announce_url: &str,
    hashes: &[InfoHash],
    config: &ScrapeConfig,
) -> Result<Vec<TrackerStats>, ScrapeError> {
    let mut url = scrape_url(announce_url)?;
    // Built by hand rather than through `Url::query_pairs_mut`: the raw info
    // hash bytes are already percent-encoded per RFC 3986, and `query_pairs_mut`
    // would re-encode them under its own (different) escaping rules.
    let query = hashes
        .iter()
        .map(|h| format!("info_hash={}", h.percent_encode()))
        .collect::<Vec<_>>()
        .join("&");
    let existing = url.query().map(str::to_string);
    let full_query = match existing {
        Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
        _ => query,
    };
    url.set_query(Some(&full_query));

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    tracing::debug!(%url, "issuing HTTP scrape request");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ScrapeError::HttpStatus(response.status()));
    }
    let body = response.bytes().await?;
    let value = crate::bencode::decode(&body)?;
    parse_scrape_response(&value, hashes)
}

fn parse_scrape_response(
    value: &BencodeValue,
    hashes: &[InfoHash],
) -> Result<Vec<TrackerStats>, ScrapeError> {
    let dict = value
        .as_dict()
        .ok_or_else(|| ScrapeError::Protocol("scrape response is not a dictionary".into()))?;

    if let Some(failure) = dict.get(b"failure reason".as_slice()) {
        let msg = failure
            .as_string()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default();
        return Err(ScrapeError::TrackerFailure(msg));
    }

    let files = dict
        .get(b"files".as_slice())
        .and_then(BencodeValue::as_dict)
        .ok_or_else(|| ScrapeError::Protocol("missing \"files\" dictionary".into()))?;

    let mut results = Vec::new();
    for hash in hashes {
        let Some(entry) = files.get(hash.as_bytes().as_slice()) else {
            continue;
        };
        let entry_dict = entry
            .as_dict()
            .ok_or_else(|| ScrapeError::Protocol("files entry is not a dictionary".into()))?;
        let complete = field_u32(entry_dict, b"complete")?;
        let incomplete = field_u32(entry_dict, b"incomplete")?;
        let downloaded = field_u32(entry_dict, b"downloaded")?;
        results.push(TrackerStats {
            tracker_url: String::new(), // filled in by the scheduler
            seeders: complete,
            peers: incomplete,
            complete: downloaded,
        });
    }
    Ok(results)
}

fn field_u32(
    dict: &std::collections::HashMap<Vec<u8>, BencodeValue>,
    key: &[u8],
) -> Result<u32, ScrapeError> {
    let value = dict.get(key).ok_or_else(|| {
        ScrapeError::Protocol(format!(
            "missing field {:?}",
            String::from_utf8_lossy(key)
        ))
    })?;
    let i = value
        .as_integer()
        .ok_or_else(|| ScrapeError::Protocol(format!("field {:?} is not an integer", key)))?;
    u32::try_from(i).map_err(|_| ScrapeError::Protocol(format!("field {:?} out of range", key)))
}
