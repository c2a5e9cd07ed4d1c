//! Content-addressed memoization of expensive, unreliable calls
//!
//! `key` turns an operation name plus its arguments into a stable
//! fingerprint; `store` persists one result file per fingerprint.

pub mod key;
pub mod store;

pub use key::{derive_key, Arg, CacheKey, CallArgs, KEY_FORMAT};
pub use store::{
    clear_store, ensure_store, EntryInfo, MemoStore, SessionStats, StoreStats, ENTRY_EXTENSION,
};
