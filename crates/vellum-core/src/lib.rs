//! # Vellum Core
//!
//! Core types shared by every Vellum crate.
//!
//! - [`Exchange`] - Per-request state that traverses the pipeline
//! - [`ExchangeState`] - The request lifecycle state machine
//! - [`RequestId`] - UUID v7 request identifier
//! - [`ResourceRef`], [`DocIdType`], [`WriteMode`], [`ETag`] - The document resource model
//! - [`VellumError`] - The request-path error taxonomy
//! - [`SyntaxError`] - Parse failures of directive and predicate text
//! - [`document`] - Lenient literal parsing and document helpers

#![doc(html_root_url = "https://docs.rs/vellum-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod document;
mod error;
mod exchange;
mod identity;
mod resource;

pub use context::RequestId;
pub use document::Document;
pub use error::{ErrorDetail, ErrorEnvelope, SyntaxError, VellumError, VellumResult};
pub use exchange::{Exchange, ExchangeError, ExchangeState};
pub use identity::Identity;
pub use resource::{DocIdType, ETag, ResourceRef, WriteMode};
