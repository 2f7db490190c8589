//! # Vellum Middleware
//!
//! The pipeline scheduler and the core request stages.
//!
//! ## Pipeline
//!
//! ```text
//! Request → Routing → [BeforeAuth] → Authentication → [AfterAuth] → [BeforeHandler]
//!                                                                        ↓
//! Response ← Commit ← [BeforeResponseCommit] ← [AfterHandler] ← ResourceHandler
//! ```
//!
//! Bracketed stages run the plugins registered at that interception point,
//! in priority order. The order is fixed. A stage or plugin that records an
//! error or stops the exchange short-circuits everything but response
//! commit.
//!
//! ## Example
//!
//! ```
//! use vellum_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 8);
//! assert_eq!(stages[0].name(), "routing");
//! assert_eq!(stages[7].name(), "response_commit");
//! ```

#![doc(html_root_url = "https://docs.rs/vellum-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use middleware::{BoxFuture, BoxedMiddleware, FnMiddleware, Middleware};
pub use pipeline::{PinnedSnapshot, Pipeline, PipelineBuilder, Stage};
pub use stages::{
    AnonymousAuthenticator, AuthenticationStage, Authenticator, HeaderAuthenticator, RequestScope,
    ResourceCatalog, ResourceHandler, RoutingStage,
};
pub use types::{build_response, Response, REQUEST_ID_HEADER};
