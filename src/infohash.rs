//! The `InfoHash` newtype: the 20-byte SHA-1 identifier of a torrent's info
//! dictionary, as accepted and returned at the public API boundary in its
//! 40-character hex form.
use crate::error::InfoHashError;
use std::fmt;
use std::str::FromStr;

/// An opaque 20-byte BitTorrent info hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// RFC 3986 unreserved percent-encoding of the raw 20 bytes, for use as
    /// the value of an `info_hash` HTTP query parameter.
    pub fn percent_encode(&self) -> String {
        let mut encoded = String::with_capacity(self.0.len() * 3);
        for &byte in &self.0 {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                    encoded.push(byte as char);
                }
                _ => {
                    encoded.push('%');
                    encoded.push_str(&hex::encode_upper([byte]));
                }
            }
        }
        encoded
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for InfoHash {
    type Err = InfoHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(InfoHashError::WrongLength(s.len()));
        }
        if s.bytes().any(|b| !matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(InfoHashError::NotHex(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| InfoHashError::NotHex(s.to_string()))?;
        let mut array = [0u8; 20];
        array.copy_from_slice(&bytes);
        Ok(InfoHash(array))
    }
}

impl TryFrom<&[u8]> for InfoHash {
    type Error = InfoHashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 20 {
            return Err(InfoHashError::WrongLength(bytes.len()));
        }
        let mut array = [0u8; 20];
        array.copy_from_slice(bytes);
        Ok(InfoHash(array))
    }
}
