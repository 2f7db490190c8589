//! Core pipeline stages.
//!
//! - [`RoutingStage`] - Resolve `/{collection}[/{id}]`
//! - [`AuthenticationStage`] - Establish the caller identity
//! - [`ResourceHandler`] - Serve the document through the write path

pub mod authentication;
pub mod resource;
pub mod routing;

pub use authentication::{AnonymousAuthenticator, AuthenticationStage, Authenticator, HeaderAuthenticator};
pub use resource::ResourceHandler;
pub use routing::{RequestScope, ResourceCatalog, RoutingStage};
