//! `rs-torrent-client`: a client library for the BitTorrent tracker scrape
//! protocol (BEP 15 over UDP, and the conventional HTTP/HTTPS scrape
//! extension). Given a set of info hashes and a set of tracker URLs,
//! concurrently queries every `(hash, tracker)` pair and returns, per hash,
//! the list of tracker responses.
//!
//! See [`scrape_info_hashes`], [`batch_scrape_info_hashes`], and
//! [`find_max_seeders`] for the public entry points.
pub mod api;
pub mod bencode;
pub mod config;
pub mod error;
pub mod http;
pub mod infohash;
pub mod scheduler;
pub mod stats;
pub mod udp;

pub use api::{
    batch_scrape_info_hashes, batch_scrape_info_hashes_with_config, find_max_seeders,
    scrape_info_hashes, scrape_info_hashes_with_config,
};
pub use config::ScrapeConfig;
pub use error::{InfoHashError, ScrapeError};
pub use infohash::InfoHash;
pub use stats::{ScrapeMap, TrackerStats};
