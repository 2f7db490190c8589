//! # Vellum
//!
//! **Pluggable request-processing core for document-store APIs**
//!
//! Every request passes through a fixed pipeline of core stages, with
//! plugins attached at named interception points and gated by predicates:
//!
//! ```text
//! Request → Routing → [BeforeAuth] → Authentication → [AfterAuth]
//!         → [BeforeHandler] → ResourceHandler → [AfterHandler]
//!         → [BeforeResponseCommit] → ResponseCommit → Response
//! ```
//!
//! Writes go through an optimistic-concurrency path: the ETag check and the
//! mutation are one atomic operation at the store.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use vellum::prelude::*;
//!
//! # tokio_test_block_on(async {
//! let config = ConfigLoader::new()
//!     .with_overrides("/resources/notes->{id_type: 'string', etag_check: true}")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//!
//! let engine = Engine::from_config(config, PluginCatalog::new(), Arc::new(InMemoryStore::new())).unwrap();
//! engine.start().await.unwrap();
//!
//! let request = http::Request::put("/notes/n1")
//!     .body(bytes::Bytes::from_static(br#"{"text": "hello"}"#))
//!     .unwrap();
//! let response = engine.handle(request).await.unwrap();
//! assert_eq!(response.status(), http::StatusCode::CREATED);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/vellum/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod engine;
mod error;

pub use engine::{log_config, Engine, EngineBuilder};
pub use error::EngineError;

// Re-export core types
pub use vellum_core as core;

// Re-export the predicate language
pub use vellum_predicate as predicate;

// Re-export configuration
pub use vellum_config as config;

// Re-export plugin types
pub use vellum_plugins as plugins;

// Re-export store types
pub use vellum_store as store;

// Re-export pipeline types
pub use vellum_middleware as middleware;

// Re-export logging setup
pub use vellum_telemetry as telemetry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Engine, EngineBuilder, EngineError};

    pub use vellum_core::{DocIdType, ETag, Exchange, ExchangeState, Identity, ResourceRef, VellumError, WriteMode};

    pub use vellum_config::{ConfigLoader, VellumConfig};

    pub use vellum_plugins::{
        BoxFuture, Flow, Initializer, InterceptPoint, Interceptor, PluginCatalog, PluginRegistration,
    };

    pub use vellum_store::{DocumentStore, InMemoryStore};

    pub use vellum_middleware::{Authenticator, HeaderAuthenticator, Response};

    pub use vellum_predicate::Predicate;
}
