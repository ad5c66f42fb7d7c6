//! Key-to-path transforms.
//!
//! A [`PathKey`] is the location of a stored key relative to the storage
//! root: a directory chain (`path_name`) and a leaf file (`file_name`).

use std::fmt;
use std::path::PathBuf;

use sha1::{Digest, Sha1};

/// Width of each directory segment cut from the hex digest.
pub const SEGMENT_WIDTH: usize = 5;

/// Number of directory segments (a SHA-1 hex digest is 40 characters).
pub const SEGMENT_COUNT: usize = 8;

/// Location of a key relative to a storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    /// Directory chain, segments joined with `/`.
    pub path_name: String,
    /// Leaf file name.
    pub file_name: String,
}

impl PathKey {
    /// Relative path of the leaf file.
    pub fn file_path(&self) -> PathBuf {
        self.dir_path().join(&self.file_name)
    }

    /// Relative path of the directory chain.
    pub fn dir_path(&self) -> PathBuf {
        self.path_name.split('/').filter(|s| !s.is_empty()).collect()
    }
}

/// Content-addressed transform: SHA-1 of the key, hex-encoded, cut into
/// [`SEGMENT_COUNT`] directories of [`SEGMENT_WIDTH`] characters, with the
/// full digest as the file name.
///
/// The output is always alphanumeric, so no key can escape the storage root.
pub fn cas_path_transform(key: &str) -> PathKey {
    let digest = hex::encode(Sha1::digest(key.as_bytes()));

    let segments: Vec<&str> = (0..digest.len() / SEGMENT_WIDTH)
        .map(|i| &digest[i * SEGMENT_WIDTH..(i + 1) * SEGMENT_WIDTH])
        .collect();
    debug_assert_eq!(segments.len(), SEGMENT_COUNT);

    PathKey {
        path_name: segments.join("/"),
        file_name: digest,
    }
}

/// Flat transform: the key is both the directory and the file name.
///
/// Keys containing `/` or `..` are used verbatim and can escape the root.
pub fn identity_path_transform(key: &str) -> PathKey {
    PathKey {
        path_name: key.to_string(),
        file_name: key.to_string(),
    }
}

/// Strategy for mapping a key to its [`PathKey`].
#[derive(Clone, Copy, Default)]
pub enum PathTransform {
    /// SHA-1 content addressing (see [`cas_path_transform`]).
    #[default]
    ContentAddressed,
    /// Flat storage (see [`identity_path_transform`]).
    Identity,
    /// Caller-supplied mapping.
    Custom(fn(&str) -> PathKey),
}

impl PathTransform {
    /// Map a key to its location. Deterministic for every variant.
    pub fn apply(&self, key: &str) -> PathKey {
        match self {
            PathTransform::ContentAddressed => cas_path_transform(key),
            PathTransform::Identity => identity_path_transform(key),
            PathTransform::Custom(f) => f(key),
        }
    }
}

impl fmt::Debug for PathTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathTransform::ContentAddressed => f.write_str("ContentAddressed"),
            PathTransform::Identity => f.write_str("Identity"),
            PathTransform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cas_transform_known_key() {
        let path_key = cas_path_transform("mybestpictures");
        assert_eq!(
            path_key.path_name,
            "7037c/79055/7f0d8/61c53/d3bbd/1fafe/02dc3/699e6"
        );
        assert_eq!(path_key.file_name, "7037c790557f0d861c53d3bbd1fafe02dc3699e6");
    }

    #[test]
    fn test_cas_file_path_nests_segments() {
        let path_key = cas_path_transform("mybestpictures");
        let path = path_key.file_path();
        let components: Vec<_> = path.iter().map(|c| c.to_string_lossy().into_owned()).collect();

        assert_eq!(components.len(), SEGMENT_COUNT + 1);
        assert_eq!(components[0], "7037c");
        assert_eq!(components[SEGMENT_COUNT], path_key.file_name);
    }

    #[test]
    fn test_identity_transform() {
        let path_key = identity_path_transform("photos");
        assert_eq!(path_key.path_name, "photos");
        assert_eq!(path_key.file_name, "photos");
        assert_eq!(path_key.file_path(), PathBuf::from("photos").join("photos"));
    }

    #[test]
    fn test_custom_transform() {
        fn upper(key: &str) -> PathKey {
            PathKey {
                path_name: "custom".into(),
                file_name: key.to_uppercase(),
            }
        }

        let transform = PathTransform::Custom(upper);
        assert_eq!(transform.apply("abc").file_name, "ABC");
        assert_eq!(format!("{:?}", transform), "Custom(..)");
    }

    #[test]
    fn test_default_is_content_addressed() {
        let key = "some-key";
        assert_eq!(PathTransform::default().apply(key), cas_path_transform(key));
    }

    proptest! {
        #[test]
        fn cas_transform_is_deterministic(key in ".*") {
            prop_assert_eq!(cas_path_transform(&key), cas_path_transform(&key));
        }

        #[test]
        fn cas_transform_stays_alphanumeric(key in ".*") {
            let path_key = cas_path_transform(&key);
            prop_assert_eq!(path_key.file_name.len(), 40);
            prop_assert!(path_key.file_name.chars().all(|c| c.is_ascii_hexdigit()));
            prop_assert_eq!(path_key.path_name.split('/').count(), SEGMENT_COUNT);
        }
    }
}
