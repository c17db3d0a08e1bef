//! Best-effort key-value persistence for the redirect record.

pub mod file;
pub mod kv_store;

pub use file::FileKvStore;
pub use kv_store::{KvStore, MemoryKvStore};
