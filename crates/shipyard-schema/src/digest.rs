//! BLAKE3 content digests of artifact bytes.
//!
//! A `ContentDigest` is the 64-character lowercase hex rendering of a 256-bit
//! BLAKE3 hash. It is both the integrity value recorded in the manifest and the
//! content-address component of the artifact's storage key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;
use thiserror::Error;

/// Read buffer used while streaming an artifact through the hasher.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Length of a hex-rendered 256-bit digest.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("failed to read artifact while hashing: {0}")]
    Read(#[source] io::Error),
    #[error("failed to rewind artifact after hashing: {0}")]
    Rewind(#[source] io::Error),
    #[error("invalid content digest '{0}': expected {DIGEST_HEX_LEN} lowercase hex characters")]
    InvalidHex(String),
}

/// Lowercase hex BLAKE3 digest of an artifact's full content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Parse an existing hex digest, rejecting anything that is not 64
    /// lowercase hex characters.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let valid = s.len() == DIGEST_HEX_LEN
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(DigestError::InvalidHex(s.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    fn from_hash(hash: &blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }
}

impl Deref for ContentDigest {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ContentDigest {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<String> for ContentDigest {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = DigestError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

/// Digest an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest::from_hash(&blake3::hash(data))
}

/// Digest everything `reader` yields until EOF.
///
/// The result depends only on the bytes, not on how the reader chunks them.
/// Interrupted reads are retried; any other read error aborts the digest.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<ContentDigest, DigestError> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buf[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(DigestError::Read(e)),
        }
    }
    Ok(ContentDigest::from_hash(&hasher.finalize()))
}

/// Digest a seekable source from its start and leave it positioned at the
/// start again, ready to be read a second time for upload.
pub fn digest_and_rewind<R: Read + Seek>(source: &mut R) -> Result<ContentDigest, DigestError> {
    source.seek(SeekFrom::Start(0)).map_err(DigestError::Rewind)?;
    let digest = digest_reader(&mut *source)?;
    source.seek(SeekFrom::Start(0)).map_err(DigestError::Rewind)?;
    Ok(digest)
}
