//! Direct Transport Layer
//!
//! Provides the HTTP transport for the Direct server. The transport layer handles:
//! - Serving the API descriptor as JSON (`api.json`) and as script (`api.js`)
//! - Choosing between the form path and the JSON batch path for router calls
//! - Decoding urlencoded and multipart form bodies, including uploads
//! - Writing replies with the content type each path requires
//!
//! The transport is decoupled from dispatch logic via the `RequestHandler` trait.

pub mod form;
pub mod server;

pub use server::{RequestHandler, TransportConfig, TransportServer};
