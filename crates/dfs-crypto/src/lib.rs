//! # dfs crypto
//!
//! Streaming symmetric encryption for bytes moving between nodes.
//!
//! ## Format
//!
//! ```text
//! IV (16 bytes, plaintext) || AES-256-CTR(key, IV, payload)
//! ```
//!
//! Counter mode is length-preserving: the ciphertext is exactly
//! [`IV_LEN`] bytes longer than the plaintext. It is not authenticated; a
//! wrong key decrypts to garbage without any error.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dfs_crypto::{decrypt_stream, encrypt_stream, EncryptionKey};
//!
//! async fn example() -> dfs_crypto::Result<()> {
//!     let key = EncryptionKey::generate();
//!
//!     let mut sealed = Vec::new();
//!     encrypt_stream(&key, &mut &b"hello"[..], &mut sealed).await?;
//!
//!     let mut opened = Vec::new();
//!     decrypt_stream(&key, &mut sealed.as_slice(), &mut opened).await?;
//!     assert_eq!(opened, b"hello");
//!     Ok(())
//! }
//! ```

pub mod cipher;
pub mod error;

pub use cipher::{decrypt_stream, encrypt_stream, EncryptionKey, CHUNK_SIZE, IV_LEN, KEY_LEN};
pub use error::{CryptoError, Result};
