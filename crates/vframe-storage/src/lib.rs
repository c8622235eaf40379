//! Frame object storage.
//!
//! This crate provides:
//! - The `ObjectStore` contract (`put`/`delete`/`exists`)
//! - An S3-compatible client configured from the environment
//! - An in-memory object store for tests and embedded use
//! - The frame store adapter: retrying, idempotent frame persistence

pub mod client;
pub mod error;
pub mod frame_store;
pub mod retry;

pub use client::{MemoryObjectStore, ObjectStore, S3Config, S3ObjectStore};
pub use error::{StorageError, StorageResult};
pub use frame_store::{frame_object_key, FrameStore};
pub use retry::{retry_async, RetryConfig, RetryResult};
