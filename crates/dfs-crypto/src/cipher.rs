//! AES-256-CTR stream encryption.
//!
//! Both directions copy in [`CHUNK_SIZE`] pieces and write each transformed
//! chunk immediately, so payloads of any length pass through bounded memory.

use std::fmt;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{CryptoError, Result};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// IV length in bytes (the AES block size).
pub const IV_LEN: usize = 16;

/// Copy buffer size. Affects throughput only, never the output.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// A 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, v.len()))
        })?;
        Ok(Self(bytes))
    }

    fn cipher(&self, iv: &[u8; IV_LEN]) -> Result<Aes256Ctr> {
        Aes256Ctr::new_from_slices(&self.0, iv).map_err(|e| CryptoError::Cipher(e.to_string()))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Encrypt everything `src` yields into `dst`.
///
/// A fresh random IV is written to `dst` first, in plaintext. Returns the
/// total number of bytes written, IV included.
pub async fn encrypt_stream<R, W>(key: &EncryptionKey, src: &mut R, dst: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let mut cipher = key.cipher(&iv)?;

    dst.write_all(&iv).await?;
    let n = apply_stream(&mut cipher, src, dst).await?;
    Ok(IV_LEN as u64 + n)
}

/// Decrypt a stream produced by [`encrypt_stream`] into `dst`.
///
/// Reads the IV prefix, then decrypts until `src` is exhausted. Returns the
/// IV length plus the number of plaintext bytes written.
pub async fn decrypt_stream<R, W>(key: &EncryptionKey, src: &mut R, dst: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut iv = [0u8; IV_LEN];
    src.read_exact(&mut iv).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => CryptoError::ShortIv { expected: IV_LEN },
        _ => CryptoError::Io(e),
    })?;
    let mut cipher = key.cipher(&iv)?;

    let n = apply_stream(&mut cipher, src, dst).await?;
    Ok(IV_LEN as u64 + n)
}

async fn apply_stream<R, W>(cipher: &mut Aes256Ctr, src: &mut R, dst: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        cipher.apply_keystream(&mut buf[..n]);
        dst.write_all(&buf[..n]).await?;
        written += n as u64;
    }

    dst.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    async fn seal(key: &EncryptionKey, plaintext: &[u8]) -> (u64, Vec<u8>) {
        let mut sealed = Vec::new();
        let n = encrypt_stream(key, &mut &plaintext[..], &mut sealed).await.unwrap();
        (n, sealed)
    }

    #[tokio::test]
    async fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let plaintext = b"Foo not Bar";

        let (written, sealed) = seal(&key, plaintext).await;
        assert_eq!(written as usize, IV_LEN + plaintext.len());
        assert_eq!(sealed.len(), IV_LEN + plaintext.len());
        assert_ne!(&sealed[IV_LEN..], plaintext);

        let mut opened = Vec::new();
        let read = decrypt_stream(&key, &mut sealed.as_slice(), &mut opened)
            .await
            .unwrap();
        assert_eq!(read as usize, IV_LEN + plaintext.len());
        assert_eq!(opened, plaintext);
    }

    #[tokio::test]
    async fn test_multi_chunk_payload() {
        let key = EncryptionKey::generate();
        let plaintext: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();

        let (_, sealed) = seal(&key, &plaintext).await;
        let mut opened = Vec::new();
        decrypt_stream(&key, &mut sealed.as_slice(), &mut opened)
            .await
            .unwrap();
        assert_eq!(opened, plaintext);
    }

    #[tokio::test]
    async fn test_fresh_iv_per_call() {
        let key = EncryptionKey::generate();
        let (_, a) = seal(&key, b"same input").await;
        let (_, b) = seal(&key, b"same input").await;

        assert_ne!(&a[..IV_LEN], &b[..IV_LEN]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_short_iv_fails() {
        let key = EncryptionKey::generate();
        let mut opened = Vec::new();
        let result = decrypt_stream(&key, &mut &[1u8, 2, 3][..], &mut opened).await;
        assert!(matches!(result, Err(CryptoError::ShortIv { expected: IV_LEN })));
    }

    #[tokio::test]
    async fn test_wrong_key_yields_garbage() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        let (_, sealed) = seal(&key1, b"secret payload").await;

        let mut opened = Vec::new();
        decrypt_stream(&key2, &mut sealed.as_slice(), &mut opened)
            .await
            .unwrap();
        assert_eq!(opened.len(), b"secret payload".len());
        assert_ne!(opened, b"secret payload");
    }

    #[test]
    fn test_key_hex_roundtrip() {
        let key = EncryptionKey::from_bytes([0x42; KEY_LEN]);
        let parsed = EncryptionKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed, key);

        assert!(matches!(
            EncryptionKey::from_hex("abcd"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(EncryptionKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = EncryptionKey::from_bytes([0x42; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }

    proptest! {
        #[test]
        fn decrypt_inverts_encrypt(plaintext in prop::collection::vec(any::<u8>(), 0..4096)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let key = EncryptionKey::generate();

            let (opened, read) = rt.block_on(async {
                let (_, sealed) = seal(&key, &plaintext).await;
                let mut opened = Vec::new();
                let read = decrypt_stream(&key, &mut sealed.as_slice(), &mut opened).await.unwrap();
                (opened, read)
            });

            prop_assert_eq!(read as usize, IV_LEN + plaintext.len());
            prop_assert_eq!(opened, plaintext);
        }
    }
}
