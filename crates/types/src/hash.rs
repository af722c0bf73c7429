//! SHA-256 digests with the lowercase-hex wire form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a hex-encoded digest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    /// Input was not exactly 64 hex characters.
    #[error("expected 64 hex characters, got {0}")]
    BadLength(usize),
    /// Input contained a non-hex character.
    #[error("invalid hex character {0:?}")]
    BadChar(char),
}

/// A SHA-256 digest.
///
/// Rendered and serialized as 64 lowercase hex characters; the all-zero
/// digest (`"0" * 64`) is the predecessor sentinel of the first block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The all-zero sentinel digest.
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Hash arbitrary bytes.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_ref());
        Digest(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the final hex character lands in the proof-of-work
    /// acceptance set `'0'..='4'` (the low nibble of the last byte).
    pub fn pow_tag_ok(&self) -> bool {
        self.0[31] & 0x0f <= 4
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            out.push(HEX_CHARS[(byte >> 4) as usize] as char);
            out.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        out
    }
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

fn hex_value(c: char) -> Result<u8, HexError> {
    match c {
        '0'..='9' => Ok(c as u8 - b'0'),
        'a'..='f' => Ok(c as u8 - b'a' + 10),
        'A'..='F' => Ok(c as u8 - b'A' + 10),
        other => Err(HexError::BadChar(other)),
    }
}

impl FromStr for Digest {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() != 64 {
            return Err(HexError::BadLength(s.chars().count()));
        }
        let mut bytes = [0u8; 32];
        let mut chars = s.chars();
        for byte in &mut bytes {
            let hi = hex_value(chars.next().expect("length checked"))?;
            let lo = hex_value(chars.next().expect("length checked"))?;
            *byte = (hi << 4) | lo;
        }
        Ok(Digest(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}..)", &self.to_hex()[..12])
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
