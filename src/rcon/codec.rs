//! XOR obfuscation used by the RCON wire protocol.
//!
//! Every byte after the handshake is XORed with a key the server sends in the
//! clear when the connection opens. This is obfuscation, not encryption: the
//! transform must match the server bit for bit, nothing more.

use bytes::Bytes;
use thiserror::Error;

/// Errors raised by the obfuscation transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The key has no bytes, so there is nothing to cycle over.
    #[error("invalid obfuscation key: key is empty")]
    InvalidKey,
}

/// Per-connection obfuscation key.
///
/// Constructed only from a non-empty byte sequence, so every `XorKey` in
/// existence can be applied without further checks.
#[derive(Clone, PartialEq, Eq)]
pub struct XorKey(Bytes);

impl XorKey {
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, CodecError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CodecError::InvalidKey);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// XOR `data` in place, starting at key offset zero.
    ///
    /// Every frame restarts at offset zero, including each read of a reply
    /// that arrives in several pieces.
    pub fn apply(&self, data: &mut [u8]) {
        for (byte, k) in data.iter_mut().zip(self.0.iter().cycle()) {
            *byte ^= k;
        }
    }

    /// Return a transformed copy of `data`.
    pub fn transform(&self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply(&mut out);
        out
    }
}

// Keys are handed to us by the server; keep them out of logs.
impl std::fmt::Debug for XorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XorKey").field("len", &self.0.len()).finish()
    }
}

/// Stateless form of the transform: `out[i] = data[i] ^ key[i % key.len()]`.
///
/// Length preserving and involutive. Fails with [`CodecError::InvalidKey`]
/// when `key` is empty.
pub fn transform(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let key = XorKey::new(Bytes::copy_from_slice(key))?;
    Ok(key.transform(data))
}
