//! # Vellum Store
//!
//! The document store API and the optimistic-concurrency write path.
//!
//! - [`DocumentStore`] - Asynchronous store addressed by collection and id
//! - [`InMemoryStore`] - Process-local store with atomic conditional writes
//! - [`DocumentWriter`] - Validates payloads and identifiers, then writes
//!   under an ETag precondition
//! - [`DocumentFilter`] - Filter and shard-key constraints of a write
//!
//! ## Concurrency
//!
//! A write carries a [`Precondition`] and the store applies it atomically
//! with the mutation: of any number of concurrent writers presenting the same
//! token, at most one succeeds. Stale-token failures are reported as
//! [`StoreError::PreconditionFailed`] and are never retried.

#![doc(html_root_url = "https://docs.rs/vellum-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod filter;
mod memory;
mod store;
mod writer;

pub use error::StoreError;
pub use filter::DocumentFilter;
pub use memory::InMemoryStore;
pub use store::{BoxFuture, DocumentStore, Precondition, StoreWrite, StoredDocument, WriteRequest};
pub use writer::{DocumentWriter, WriteCommand, WriteOutcome, WriteResult};
