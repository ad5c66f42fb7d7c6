//! Proptest generators for property-based testing.

use dfs_core::Message;
use proptest::prelude::*;

/// Generate a storage key: printable, including separators and dots.
pub fn storage_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _./-]{0,64}"
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a protocol message.
pub fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (storage_key(), any::<u64>()).prop_map(|(key, size)| Message::StoreFile { key, size }),
        storage_key().prop_map(|key| Message::GetFile { key }),
    ]
}
