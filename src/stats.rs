//! The shapes returned across the public API boundary.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tracker's response for one info hash: seeders (complete), leechers
/// (incomplete/peers), and the cumulative completed-download count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub tracker_url: String,
    pub seeders: u32,
    pub peers: u32,
    pub complete: u32,
}

/// A mapping from hex-encoded info hash to the list of tracker responses
/// that succeeded for it. Contains an entry for every input hash, even if
/// its list is empty because every tracker failed for that hash.
pub type ScrapeMap = HashMap<String, Vec<TrackerStats>>;
