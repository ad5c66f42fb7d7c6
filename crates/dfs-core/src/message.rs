//! Replication protocol messages.
//!
//! Messages travel inside MESSAGE frames. They are CBOR-encoded; CBOR keeps
//! the variant name, so the receiver always reconstructs the right variant
//! without any runtime type registry.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Message size limits.
pub mod limits {
    /// Max length of a storage key, in bytes.
    pub const MAX_KEY_LEN: usize = 4096;
    /// Max encoded message size, in bytes.
    pub const MAX_MESSAGE_LEN: usize = 64 * 1024;
}

/// Control messages exchanged between file servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Announces that `size` raw bytes for `key` follow on this connection,
    /// right after a STREAM marker.
    StoreFile {
        /// The storage key.
        key: String,
        /// Exact number of raw bytes the sender will push.
        size: u64,
    },

    /// Asks the receiver to push back the file stored under `key`, or a
    /// zero length if it has none.
    GetFile {
        /// The storage key.
        key: String,
    },
}

impl Message {
    /// The storage key this message refers to.
    pub fn key(&self) -> &str {
        match self {
            Message::StoreFile { key, .. } | Message::GetFile { key } => key,
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<()> {
        if self.key().len() > limits::MAX_KEY_LEN {
            return Err(CoreError::LimitExceeded("key too long"));
        }
        Ok(())
    }

    /// Encode to CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate_limits()?;
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_MESSAGE_LEN {
            return Err(CoreError::LimitExceeded("message too large"));
        }
        let message: Message =
            ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        message.validate_limits()?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_file_keeps_variant() {
        let msg = Message::StoreFile {
            key: "photos/cat.jpg".into(),
            size: 1 << 40,
        };
        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_get_file_keeps_variant() {
        let msg = Message::GetFile { key: "x".into() };
        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert!(matches!(decoded, Message::GetFile { ref key } if key == "x"));
    }

    #[test]
    fn test_key_accessor() {
        assert_eq!(Message::GetFile { key: "a".into() }.key(), "a");
        assert_eq!(
            Message::StoreFile {
                key: "b".into(),
                size: 0
            }
            .key(),
            "b"
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            Message::from_bytes(&[0xff, 0x00, 0x13]),
            Err(CoreError::DecodingError(_))
        ));
    }

    #[test]
    fn test_key_limit_exceeded() {
        let msg = Message::GetFile {
            key: "k".repeat(limits::MAX_KEY_LEN + 1),
        };
        assert!(matches!(msg.to_bytes(), Err(CoreError::LimitExceeded(_))));
    }
}
