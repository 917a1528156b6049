//! Direct server: method registry and request dispatch.
//!
//! Methods are registered into a [`MethodRegistry`] at startup, which is
//! then moved into a [`DirectServer`]. The server implements the
//! transport's `RequestHandler`, turning every call into a result or
//! exception record.

pub mod api;
pub mod classifier;
pub mod registry;
pub mod router;

pub use api::ProviderConfig;
pub use classifier::ErrorClassifier;
pub use registry::{DirectMethod, MethodRegistry, MethodSpec, RegisteredMethod};
pub use router::{DirectServer, ServerConfig};
