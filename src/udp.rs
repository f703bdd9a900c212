//! The UDP scrape client (BEP 15).
//!
//! Grounded in `peer::handshake` from the crate this library started from
//! for the "serialize a fixed-size wire struct, read a fixed number of
//! bytes, validate, construct" idiom — applied here to the connect/scrape
//! datagrams instead of the peer wire handshake, and made retry-aware since
//! UDP gives no delivery guarantee.
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::infohash::InfoHash;
use crate::stats::TrackerStats;
use rand::Rng;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::UdpSocket;
use url::Url;

const PROTOCOL_MAGIC: u64 = 0x0000_0417_2710_1980;
const ACTION_CONNECT: u32 = 0;
const ACTION_SCRAPE: u32 = 2;
const ACTION_ERROR: u32 = 3;

struct UdpSession {
    socket: UdpSocket,
    connection_id: u64,
    connection_id_acquired_at: Instant,
}

/// Resolves and connects a UDP socket to `announce_url`'s host and port.
async fn open_socket(announce_url: &Url) -> Result<(UdpSocket, SocketAddr), ScrapeError> {
    let host = announce_url
        .host_str()
        .ok_or_else(|| ScrapeError::Protocol("UDP tracker URL has no host".into()))?;
    let port = announce_url
        .port()
        .ok_or_else(|| ScrapeError::Protocol("UDP tracker URL has no port".into()))?;

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(ScrapeError::Resolution)?;
    let remote = addrs
        .next()
        .ok_or_else(|| ScrapeError::Resolution(std::io::Error::other("no addresses resolved")))?;

    let local_bind = if remote.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
    let socket = UdpSocket::bind(local_bind)
        .await
        .map_err(ScrapeError::Transport)?;
    socket.connect(remote).await.map_err(ScrapeError::Transport)?;
    Ok((socket, remote))
}

/// Sends `request` and waits for a validated reply, retransmitting
/// `request` (with a caller-refreshed transaction id baked in, since each
/// call constructs its own request buffer) after each entry of `schedule`
/// elapses without one. Packets that fail `validate` are dropped and
/// waiting continues within the current window; exhausting `schedule`
/// without a match is a timeout.
async fn send_with_retry<T>(
    socket: &UdpSocket,
    build_request: impl Fn() -> (Vec<u8>, u32),
    schedule: &[std::time::Duration],
    mut validate: impl FnMut(&[u8], u32) -> Result<Option<T>, ScrapeError>,
) -> Result<T, ScrapeError> {
    let mut buf = [0u8; 1500];
    for &delay in schedule {
        let (request, transaction_id) = build_request();
        socket.send(&request).await.map_err(ScrapeError::Transport)?;

        let deadline = tokio::time::Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    if let Some(result) = validate(&buf[..n], transaction_id)? {
                        return Ok(result);
                    }
                }
                Ok(Err(e)) => return Err(ScrapeError::Transport(e)),
                Err(_elapsed) => break,
            }
        }
    }
    Err(ScrapeError::Timeout)
}

fn random_transaction_id() -> u32 {
    rand::rng().random()
}

/// Runs the BEP-15 connect handshake, returning a fresh `UdpSession`.
async fn connect(socket: UdpSocket, config: &ScrapeConfig) -> Result<UdpSession, ScrapeError> {
    let connection_id = send_with_retry(
        &socket,
        || {
            let transaction_id = random_transaction_id();
            let mut request = Vec::with_capacity(16);
            request.extend_from_slice(&PROTOCOL_MAGIC.to_be_bytes());
            request.extend_from_slice(&ACTION_CONNECT.to_be_bytes());
            request.extend_from_slice(&transaction_id.to_be_bytes());
            (request, transaction_id)
        },
        &[config.udp_connect_timeout]
            .iter()
            .copied()
            .chain(config.udp_retry_schedule.iter().copied())
            .collect::<Vec<_>>(),
        |reply, transaction_id| parse_connect_reply(reply, transaction_id),
    )
    .await?;

    Ok(UdpSession {
        socket,
        connection_id,
        connection_id_acquired_at: Instant::now(),
    })
}

fn parse_connect_reply(reply: &[u8], transaction_id: u32) -> Result<Option<u64>, ScrapeError> {
    if reply.len() < 8 {
        return Ok(None);
    }
    let action = u32::from_be_bytes(reply[0..4].try_into().unwrap());
    let got_transaction_id = u32::from_be_bytes(reply[4..8].try_into().unwrap());
    if got_transaction_id != transaction_id {
        return Ok(None);
    }
    if action == ACTION_ERROR {
        return Err(ScrapeError::TrackerFailure(error_message(&reply[8..])));
    }
    if action != ACTION_CONNECT || reply.len() < 16 {
        return Ok(None);
    }
    Ok(Some(u64::from_be_bytes(reply[8..16].try_into().unwrap())))
}

fn error_message(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

/// Scrapes one batch of up to `config.udp_max_batch` hashes using an
/// already-connected session, refreshing the connection id first if its
/// BEP-15 TTL has elapsed.
async fn scrape_batch(
    session: &mut UdpSession,
    batch: &[InfoHash],
    config: &ScrapeConfig,
) -> Result<Vec<(u32, u32, u32)>, ScrapeError> {
    if session.connection_id_acquired_at.elapsed() >= config.udp_connection_id_ttl {
        let socket = std::mem::replace(&mut session.socket, UdpSocket::bind("0.0.0.0:0").await.map_err(ScrapeError::Transport)?);
        let refreshed = connect(socket, config).await?;
        session.socket = refreshed.socket;
        session.connection_id = refreshed.connection_id;
        session.connection_id_acquired_at = refreshed.connection_id_acquired_at;
    }

    let connection_id = session.connection_id;
    let expected_triples = batch.len();
    let triples = send_with_retry(
        &session.socket,
        || {
            let transaction_id = random_transaction_id();
            let mut request = Vec::with_capacity(16 + 20 * batch.len());
            request.extend_from_slice(&connection_id.to_be_bytes());
            request.extend_from_slice(&ACTION_SCRAPE.to_be_bytes());
            request.extend_from_slice(&transaction_id.to_be_bytes());
            for hash in batch {
                request.extend_from_slice(hash.as_bytes());
            }
            (request, transaction_id)
        },
        &config.udp_retry_schedule,
        |reply, transaction_id| parse_scrape_reply(reply, transaction_id, expected_triples),
    )
    .await?;

    Ok(triples)
}

fn parse_scrape_reply(
    reply: &[u8],
    transaction_id: u32,
    expected_triples: usize,
) -> Result<Option<Vec<(u32, u32, u32)>>, ScrapeError> {
    if reply.len() < 8 {
        return Ok(None);
    }
    let action = u32::from_be_bytes(reply[0..4].try_into().unwrap());
    let got_transaction_id = u32::from_be_bytes(reply[4..8].try_into().unwrap());
    if got_transaction_id != transaction_id {
        return Ok(None);
    }
    if action == ACTION_ERROR {
        return Err(ScrapeError::TrackerFailure(error_message(&reply[8..])));
    }
    if action != ACTION_SCRAPE {
        return Ok(None);
    }
    let expected_len = 8 + 12 * expected_triples;
    if reply.len() != expected_len {
        return Ok(None);
    }
    let payload = &reply[8..];
    let triples = payload
        .chunks_exact(12)
        .map(|chunk| {
            let complete = u32::from_be_bytes(chunk[0..4].try_into().unwrap());
            let downloaded = u32::from_be_bytes(chunk[4..8].try_into().unwrap());
            let incomplete = u32::from_be_bytes(chunk[8..12].try_into().unwrap());
            (complete, downloaded, incomplete)
        })
        .collect();
    Ok(Some(triples))
}

/// Scrapes `hashes` against the UDP tracker at `announce_url`, batching
/// into groups of `config.udp_max_batch` and re-using one connect handshake
/// (refreshed on TTL expiry) across all batches.
#[tracing::instrument(skip(hashes, config), fields(tracker = %announce_url))]
pub(crate) async fn scrape(
    announce_url: &str,
    hashes: &[InfoHash],
    config: &ScrapeConfig,
) -> Result<Vec<TrackerStats>, ScrapeError> {
    let url = Url::parse(announce_url)?;
    let (socket, _remote) = open_socket(&url).await?;
    let mut session = connect(socket, config).await?;

    let mut results = Vec::with_capacity(hashes.len());
    for batch in hashes.chunks(config.udp_max_batch.max(1)) {
        let triples = scrape_batch(&mut session, batch, config).await?;
        for (hash, (complete, downloaded, incomplete)) in batch.iter().zip(triples) {
            let _ = hash; // stats are positional; tracker_url filled in by the scheduler
            results.push(TrackerStats {
                tracker_url: String::new(),
                seeders: complete,
                peers: incomplete,
                complete: downloaded,
            });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    async fn stub_socket() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn connect_phase_succeeds_with_matching_transaction_id() {
        let server = stub_socket().await;
        let server_addr = server.local_addr().unwrap();
        let client = stub_socket().await;
        client.connect(server_addr).await.unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let (_n, from) = server.recv_from(&mut buf).await.unwrap();
            let transaction_id = u32::from_be_bytes(buf[12..16].try_into().unwrap());
            let mut reply = Vec::new();
            reply.extend_from_slice(&0u32.to_be_bytes());
            reply.extend_from_slice(&transaction_id.to_be_bytes());
            reply.extend_from_slice(&0xDEAD_BEEF_CAFE_BABEu64.to_be_bytes());
            server.send_to(&reply, from).await.unwrap();
        });

        let config = ScrapeConfig::default();
        let session = connect(client, &config).await.unwrap();
        assert_eq!(session.connection_id, 0xDEAD_BEEF_CAFE_BABE);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wrong_transaction_id_is_treated_as_timeout() {
        let server = stub_socket().await;
        let server_addr = server.local_addr().unwrap();
        let client = stub_socket().await;
        client.connect(server_addr).await.unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            loop {
                let Ok((_n, from)) = server.recv_from(&mut buf).await else {
                    break;
                };
                let mut reply = Vec::new();
                reply.extend_from_slice(&0u32.to_be_bytes());
                reply.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // never matches
                reply.extend_from_slice(&1u64.to_be_bytes());
                if server.send_to(&reply, from).await.is_err() {
                    break;
                }
            }
        });

        let mut config = ScrapeConfig::default();
        config.udp_connect_timeout = Duration::from_millis(50);
        config.udp_retry_schedule = vec![Duration::from_millis(50)];
        let result = connect(client, &config).await;
        assert!(matches!(result, Err(ScrapeError::Timeout)));
        handle.abort();
    }

    #[tokio::test]
    async fn connect_retry_within_budget_succeeds() {
        let server = stub_socket().await;
        let server_addr = server.local_addr().unwrap();
        let client = stub_socket().await;
        client.connect(server_addr).await.unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            // Drop the first two connect datagrams, answer the third.
            for _ in 0..2 {
                server.recv_from(&mut buf).await.unwrap();
            }
            let (_n, from) = server.recv_from(&mut buf).await.unwrap();
            let transaction_id = u32::from_be_bytes(buf[12..16].try_into().unwrap());
            let mut reply = Vec::new();
            reply.extend_from_slice(&0u32.to_be_bytes());
            reply.extend_from_slice(&transaction_id.to_be_bytes());
            reply.extend_from_slice(&42u64.to_be_bytes());
            server.send_to(&reply, from).await.unwrap();
        });

        let mut config = ScrapeConfig::default();
        config.udp_connect_timeout = Duration::from_millis(30);
        config.udp_retry_schedule = vec![Duration::from_millis(30); 4];
        let session = connect(client, &config).await.unwrap();
        assert_eq!(session.connection_id, 42);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn connect_retry_beyond_budget_fails() {
        let server = stub_socket().await;
        let server_addr = server.local_addr().unwrap();
        let client = stub_socket().await;
        client.connect(server_addr).await.unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            // Drop everything.
            loop {
                if server.recv_from(&mut buf).await.is_err() {
                    break;
                }
            }
        });

        let mut config = ScrapeConfig::default();
        config.udp_connect_timeout = Duration::from_millis(20);
        config.udp_retry_schedule = vec![Duration::from_millis(20); 2];
        let result = connect(client, &config).await;
        assert!(matches!(result, Err(ScrapeError::Timeout)));
        handle.abort();
    }

    #[test]
    fn scrape_reply_rejects_wrong_length() {
        let mut reply = Vec::new();
        reply.extend_from_slice(&ACTION_SCRAPE.to_be_bytes());
        reply.extend_from_slice(&7u32.to_be_bytes());
        reply.extend_from_slice(&[0u8; 11]); // one byte short of one triple
        let result = parse_scrape_reply(&reply, 7, 1).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn scrape_reply_parses_triples_in_order() {
        let mut reply = Vec::new();
        reply.extend_from_slice(&ACTION_SCRAPE.to_be_bytes());
        reply.extend_from_slice(&9u32.to_be_bytes());
        reply.extend_from_slice(&1022u32.to_be_bytes());
        reply.extend_from_slice(&14920u32.to_be_bytes());
        reply.extend_from_slice(&2u32.to_be_bytes());
        let result = parse_scrape_reply(&reply, 9, 1).unwrap().unwrap();
        assert_eq!(result, vec![(1022, 14920, 2)]);
    }

    /// Drives the public `scrape()` entry point through both the connect and
    /// scrape phases against a loopback stub, matching spec.md §8 scenario 2.
    #[tokio::test]
    async fn scrape_end_to_end_connect_then_scrape() {
        let server = stub_socket().await;
        let server_addr = server.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1500];

            let (_n, from) = server.recv_from(&mut buf).await.unwrap();
            let connect_transaction_id = u32::from_be_bytes(buf[12..16].try_into().unwrap());
            let mut reply = Vec::new();
            reply.extend_from_slice(&ACTION_CONNECT.to_be_bytes());
            reply.extend_from_slice(&connect_transaction_id.to_be_bytes());
            reply.extend_from_slice(&0xDEAD_BEEF_CAFE_BABEu64.to_be_bytes());
            server.send_to(&reply, from).await.unwrap();

            let (_n, from) = server.recv_from(&mut buf).await.unwrap();
            let scrape_transaction_id = u32::from_be_bytes(buf[12..16].try_into().unwrap());
            let mut reply = Vec::new();
            reply.extend_from_slice(&ACTION_SCRAPE.to_be_bytes());
            reply.extend_from_slice(&scrape_transaction_id.to_be_bytes());
            reply.extend_from_slice(&1022u32.to_be_bytes());
            reply.extend_from_slice(&14920u32.to_be_bytes());
            reply.extend_from_slice(&2u32.to_be_bytes());
            server.send_to(&reply, from).await.unwrap();
        });

        let url = format!("udp://{server_addr}");
        let hash = InfoHash::try_from([9u8; 20].as_slice()).unwrap();
        let config = ScrapeConfig::default();
        let stats = scrape(&url, &[hash], &config).await.unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].seeders, 1022);
        assert_eq!(stats[0].peers, 2);
        assert_eq!(stats[0].complete, 14920);
        handle.await.unwrap();
    }

    /// 150 hashes exceeds the default 74-hash batch cap, so `scrape()` must
    /// issue multiple scrape datagrams and still return all 150 results, in
    /// order, matching spec.md §8's "Batching" property.
    #[tokio::test]
    async fn scrape_batches_150_hashes_into_multiple_requests() {
        let server = stub_socket().await;
        let server_addr = server.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 2048];

            let (_n, from) = server.recv_from(&mut buf).await.unwrap();
            let connect_transaction_id = u32::from_be_bytes(buf[12..16].try_into().unwrap());
            let mut reply = Vec::new();
            reply.extend_from_slice(&ACTION_CONNECT.to_be_bytes());
            reply.extend_from_slice(&connect_transaction_id.to_be_bytes());
            reply.extend_from_slice(&0xDEAD_BEEF_CAFE_BABEu64.to_be_bytes());
            server.send_to(&reply, from).await.unwrap();

            let mut batches_seen = 0u32;
            let mut hashes_seen = 0usize;
            while hashes_seen < 150 {
                let (n, from) = server.recv_from(&mut buf).await.unwrap();
                let transaction_id = u32::from_be_bytes(buf[12..16].try_into().unwrap());
                let payload = &buf[16..n];
                let mut reply = Vec::new();
                reply.extend_from_slice(&ACTION_SCRAPE.to_be_bytes());
                reply.extend_from_slice(&transaction_id.to_be_bytes());
                for chunk in payload.chunks_exact(20) {
                    // Echo each hash's first byte as every field of its
                    // triple, so the test can verify both identity and order.
                    let marker = u32::from(chunk[0]);
                    reply.extend_from_slice(&marker.to_be_bytes());
                    reply.extend_from_slice(&marker.to_be_bytes());
                    reply.extend_from_slice(&marker.to_be_bytes());
                }
                server.send_to(&reply, from).await.unwrap();
                batches_seen += 1;
                hashes_seen += payload.len() / 20;
            }
            batches_seen
        });

        let hashes: Vec<InfoHash> = (0..150u32)
            .map(|i| {
                let mut bytes = [0xAAu8; 20];
                bytes[0] = i as u8;
                InfoHash::try_from(bytes.as_slice()).unwrap()
            })
            .collect();

        let url = format!("udp://{server_addr}");
        let config = ScrapeConfig::default();
        let stats = scrape(&url, &hashes, &config).await.unwrap();

        let batches_seen = handle.await.unwrap();
        assert!(
            batches_seen >= 2,
            "150 hashes at a 74-hash cap must produce at least two scrape datagrams, got {batches_seen}"
        );
        assert_eq!(stats.len(), 150);
        for (i, stat) in stats.iter().enumerate() {
            assert_eq!(stat.seeders, i as u32, "stats must stay positionally paired with their hash");
        }
    }

    #[test]
    fn error_action_surfaces_as_tracker_failure() {
        let mut reply = Vec::new();
        reply.extend_from_slice(&ACTION_ERROR.to_be_bytes());
        reply.extend_from_slice(&5u32.to_be_bytes());
        reply.extend_from_slice(b"nope");
        let err = parse_connect_reply(&reply, 5).unwrap_err();
        assert!(matches!(err, ScrapeError::TrackerFailure(msg) if msg == "nope"));
    }
}
