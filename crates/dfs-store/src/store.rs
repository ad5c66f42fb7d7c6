//! Filesystem-backed content store.

use std::path::{Component, Path, PathBuf};

use dfs_core::{PathKey, PathTransform};
use dfs_crypto::{decrypt_stream, EncryptionKey, IV_LEN};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::{Result, StoreError};

/// Storage root used when none is configured.
pub const DEFAULT_ROOT: &str = "dfs-data";

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding every stored file.
    pub root: PathBuf,
    /// Key-to-path mapping.
    pub path_transform: PathTransform,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            path_transform: PathTransform::ContentAddressed,
        }
    }
}

/// Local file storage keyed by string.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    transform: PathTransform,
}

impl Store {
    /// Create a store. An empty root falls back to [`DEFAULT_ROOT`].
    pub fn new(config: StoreConfig) -> Self {
        let root = if config.root.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_ROOT)
        } else {
            config.root
        };
        Self {
            root,
            transform: config.path_transform,
        }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `key` lives relative to the root.
    pub fn path_key(&self, key: &str) -> PathKey {
        self.transform.apply(key)
    }

    /// Absolute location of the file for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(self.path_key(key).file_path())
    }

    /// Whether a file exists for `key`.
    ///
    /// Only a definite "not found" counts as absent; any other metadata
    /// error reports the key as present and surfaces on the next read.
    pub async fn has(&self, key: &str) -> bool {
        match fs::metadata(self.path_for(key)).await {
            Ok(_) => true,
            Err(e) => e.kind() != std::io::ErrorKind::NotFound,
        }
    }

    /// Copy all of `src` into the file for `key`, replacing any previous
    /// contents. Returns the exact number of bytes copied.
    pub async fn write<R>(&self, key: &str, src: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = self.create(key).await?;
        let n = tokio::io::copy(src, &mut file).await?;
        file.flush().await?;

        tracing::debug!(key = %key, bytes = n, "written to disk");
        Ok(n)
    }

    /// Decrypt an [`encrypt_stream`](dfs_crypto::encrypt_stream) payload from
    /// `src` into the file for `key`. Returns the plaintext bytes written.
    pub async fn write_decrypt<R>(
        &self,
        key: &str,
        cipher_key: &EncryptionKey,
        src: &mut R,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = self.create(key).await?;
        let n = decrypt_stream(cipher_key, src, &mut file).await? - IV_LEN as u64;

        tracing::debug!(key = %key, bytes = n, "decrypted to disk");
        Ok(n)
    }

    /// Open the file for `key`. Returns its size and a handle at offset 0.
    pub async fn read(&self, key: &str) -> Result<(u64, File)> {
        let file = File::open(self.path_for(key)).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Io(e),
        })?;
        let size = file.metadata().await?.len();
        Ok((size, file))
    }

    /// Remove the file for `key` and prune its now-empty directories.
    ///
    /// Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path_key = self.path_key(key);
        let path = self.root.join(path_key.file_path());

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(path = %path.display(), "deleted from disk");

        let dir = path_key.dir_path();
        if dir.components().all(|c| matches!(c, Component::Normal(_))) {
            self.prune_empty_dirs(&dir).await;
        }
        Ok(())
    }

    /// Remove the whole storage root.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, key: &str) -> Result<File> {
        let path_key = self.path_key(key);
        fs::create_dir_all(self.root.join(path_key.dir_path())).await?;
        Ok(File::create(self.root.join(path_key.file_path())).await?)
    }

    /// Walk from the deepest directory towards the root, stopping at the
    /// first one that is not empty.
    async fn prune_empty_dirs(&self, relative: &Path) {
        let mut current = Some(relative);
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            if fs::remove_dir(self.root.join(dir)).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::AsyncReadExt;

    fn temp_store(transform: PathTransform) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig {
            root: dir.path().join("store"),
            path_transform: transform,
        });
        (dir, store)
    }

    async fn read_all(store: &Store, key: &str) -> Vec<u8> {
        let (size, mut file) = store.read(key).await.unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        assert_eq!(size as usize, buf.len());
        buf
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);

        let n = store.write("mybestpictures", &mut &b"some jpg"[..]).await.unwrap();
        assert_eq!(n, 8);
        assert_eq!(read_all(&store, "mybestpictures").await, b"some jpg");

        let expected = store
            .root()
            .join("7037c/79055/7f0d8/61c53/d3bbd/1fafe/02dc3/699e6")
            .join("7037c790557f0d861c53d3bbd1fafe02dc3699e6");
        assert_eq!(store.path_for("mybestpictures"), expected);
        assert!(expected.is_file());
    }

    #[tokio::test]
    async fn test_has_write_delete_cycle() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);

        assert!(!store.has("cycle").await);
        store.write("cycle", &mut &b"x"[..]).await.unwrap();
        assert!(store.has("cycle").await);
        store.delete("cycle").await.unwrap();
        assert!(!store.has("cycle").await);
    }

    #[tokio::test]
    async fn test_overwrite_truncates() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);

        store.write("k", &mut &b"a much longer payload"[..]).await.unwrap();
        store.write("k", &mut &b"short"[..]).await.unwrap();
        assert_eq!(read_all(&store, "k").await, b"short");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);
        assert!(matches!(
            store.read("missing").await,
            Err(StoreError::NotFound(key)) if key == "missing"
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_succeeds() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);
        store.delete("mybestpictures2").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_dirs() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);

        store.write("prune-me", &mut &b"bytes"[..]).await.unwrap();
        store.delete("prune-me").await.unwrap();

        let mut entries = fs::read_dir(store.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_keeps_shared_dirs() {
        fn shared(key: &str) -> PathKey {
            PathKey {
                path_name: "bucket/inner".into(),
                file_name: key.to_string(),
            }
        }
        let (_dir, store) = temp_store(PathTransform::Custom(shared));

        store.write("a", &mut &b"first"[..]).await.unwrap();
        store.write("b", &mut &b"second"[..]).await.unwrap();
        store.delete("a").await.unwrap();

        assert!(!store.has("a").await);
        assert_eq!(read_all(&store, "b").await, b"second");
    }

    #[tokio::test]
    async fn test_identity_transform_is_flat() {
        let (_dir, store) = temp_store(PathTransform::Identity);

        store.write("notes", &mut &b"flat"[..]).await.unwrap();
        assert_eq!(store.path_for("notes"), store.root().join("notes").join("notes"));
        assert_eq!(read_all(&store, "notes").await, b"flat");
    }

    #[tokio::test]
    async fn test_clear_removes_root() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);

        store.write("one", &mut &b"1"[..]).await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.root().exists());

        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_decrypt() {
        let (_dir, store) = temp_store(PathTransform::ContentAddressed);
        let key = EncryptionKey::generate();

        let mut sealed = Vec::new();
        dfs_crypto::encrypt_stream(&key, &mut &b"classified"[..], &mut sealed)
            .await
            .unwrap();

        let n = store
            .write_decrypt("secret", &key, &mut sealed.as_slice())
            .await
            .unwrap();
        assert_eq!(n, 10);
        assert_eq!(read_all(&store, "secret").await, b"classified");
    }

    #[test]
    fn test_empty_root_falls_back() {
        let store = Store::new(StoreConfig {
            root: PathBuf::new(),
            ..StoreConfig::default()
        });
        assert_eq!(store.root(), Path::new(DEFAULT_ROOT));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn write_read_delete_roundtrip(
            key in "[a-zA-Z0-9 _.-]{0,64}",
            payload in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let (_dir, store) = temp_store(PathTransform::ContentAddressed);

            let (had, stored, read_back, has_after_delete) = rt.block_on(async {
                let had = store.has(&key).await;
                store.write(&key, &mut payload.as_slice()).await.unwrap();
                let stored = store.has(&key).await;
                let read_back = read_all(&store, &key).await;
                store.delete(&key).await.unwrap();
                (had, stored, read_back, store.has(&key).await)
            });

            prop_assert!(!had);
            prop_assert!(stored);
            prop_assert_eq!(read_back, payload);
            prop_assert!(!has_after_delete);
        }
    }
}
