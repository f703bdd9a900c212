//! Error taxonomy for the scrape client.
//!
//! `InfoHashError` is the only error that ever reaches a caller: it is
//! raised synchronously at the API boundary, before any network I/O, when
//! an info hash string is malformed. `ScrapeError` never leaves this crate
//! in a `Result`; a per-tracker failure is logged and degrades silently to
//! an absent contribution in the merged result (see `crate::scheduler`).
use thiserror::Error;

/// Returned by the public API entry points when an input info hash is not a
/// 40-character lowercase hex string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InfoHashError {
    #[error("info hash must be 40 hex characters, got {0}")]
    WrongLength(usize),

    #[error("info hash contains non-hex characters: {0:?}")]
    NotHex(String),
}

/// Internal, per-tracker failure taxonomy. Never propagated to a caller of
/// `scrape_info_hashes`/`batch_scrape_info_hashes`; each variant maps to an
/// absent contribution for the tracker that produced it.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unparseable or unsupported tracker URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported tracker URL scheme: {0:?}")]
    UnsupportedScheme(String),

    #[error("failed to resolve tracker host: {0}")]
    Resolution(#[source] std::io::Error),

    #[error("transport error talking to tracker: {0}")]
    Transport(#[source] std::io::Error),

    #[error("tracker request timed out")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("bencode decode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("HTTP error status: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker reported failure: {0}")]
    TrackerFailure(String),
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
