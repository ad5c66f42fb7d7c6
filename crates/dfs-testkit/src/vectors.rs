//! Golden test vectors.
//!
//! Path vectors pin the content-addressed layout, so two builds always put
//! the same key in the same place on disk. Cipher vectors are the NIST
//! SP 800-38A CTR-AES256 known answers, fed through [`decrypt_stream`] as an
//! IV-prefixed payload.

use dfs_core::cas_path_transform;
use dfs_crypto::{decrypt_stream, EncryptionKey, KEY_LEN};

/// Expected content-addressed location of a key.
#[derive(Debug, Clone)]
pub struct PathVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Storage key.
    pub key: &'static str,
    /// Expected directory chain.
    pub path_name: &'static str,
    /// Expected file name (the SHA-1 hex digest).
    pub file_name: &'static str,
}

/// A counter-mode known answer.
#[derive(Debug, Clone)]
pub struct CipherVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// AES-256 key (hex).
    pub key: &'static str,
    /// Initial counter block (hex).
    pub iv: &'static str,
    /// Plaintext (hex).
    pub plaintext: &'static str,
    /// Ciphertext (hex).
    pub ciphertext: &'static str,
}

/// All path vectors.
pub fn path_vectors() -> Vec<PathVector> {
    vec![
        PathVector {
            name: "photo key",
            key: "mybestpictures",
            path_name: "7037c/79055/7f0d8/61c53/d3bbd/1fafe/02dc3/699e6",
            file_name: "7037c790557f0d861c53d3bbd1fafe02dc3699e6",
        },
        PathVector {
            name: "private data key",
            key: "myPrivateData",
            path_name: "af55c/8a597/4c5f0/eca5c/e6e30/76179/265bd/898f0",
            file_name: "af55c8a5974c5f0eca5ce6e3076179265bd898f0",
        },
        PathVector {
            name: "empty key",
            key: "",
            path_name: "da39a/3ee5e/6b4b0/d3255/bfef9/56018/90afd/80709",
            file_name: "da39a3ee5e6b4b0d3255bfef95601890afd80709",
        },
        PathVector {
            name: "key with a space",
            key: "hello world",
            path_name: "2aae6/c35c9/4fcfb/415db/e95f4/08b9c/e91ee/846ed",
            file_name: "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed",
        },
        PathVector {
            name: "file name key",
            key: "picture_1.png",
            path_name: "69ad3/ac500/e651c/47611/7fe45/b7f33/35ae2/64b4a",
            file_name: "69ad3ac500e651c476117fe45b7f3335ae264b4a",
        },
    ]
}

/// All cipher vectors.
pub fn cipher_vectors() -> Vec<CipherVector> {
    vec![
        CipherVector {
            name: "SP 800-38A F.5.5 block 1",
            key: "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
            iv: "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff",
            plaintext: "6bc1bee22e409f96e93d7e117393172a",
            ciphertext: "601ec313775789a5b7a7f504bbf3d228",
        },
        CipherVector {
            name: "SP 800-38A F.5.5 blocks 1-2",
            key: "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
            iv: "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff",
            plaintext: "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51",
            ciphertext: "601ec313775789a5b7a7f504bbf3d228f443e3ca4d62b59aca84e990cacaf5c5",
        },
    ]
}

/// Whether the path transform reproduces `vector`.
pub fn check_path_vector(vector: &PathVector) -> bool {
    let path_key = cas_path_transform(vector.key);
    path_key.path_name == vector.path_name && path_key.file_name == vector.file_name
}

/// Decrypt `IV || ciphertext` of `vector`. Returns the recovered plaintext.
pub async fn open_cipher_vector(vector: &CipherVector) -> Vec<u8> {
    let key: [u8; KEY_LEN] = hex::decode(vector.key)
        .expect("vector key is hex")
        .try_into()
        .expect("vector key is 32 bytes");

    let mut sealed = hex::decode(vector.iv).expect("vector iv is hex");
    sealed.extend(hex::decode(vector.ciphertext).expect("vector ciphertext is hex"));

    let mut opened = Vec::new();
    decrypt_stream(&EncryptionKey::from_bytes(key), &mut sealed.as_slice(), &mut opened)
        .await
        .expect("decrypt known answer");
    opened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_vectors() {
        for vector in path_vectors() {
            assert!(check_path_vector(&vector), "vector {:?} failed", vector.name);
        }
    }

    #[tokio::test]
    async fn test_cipher_vectors() {
        for vector in cipher_vectors() {
            let opened = open_cipher_vector(&vector).await;
            assert_eq!(hex::encode(opened), vector.plaintext, "vector {:?}", vector.name);
        }
    }
}
