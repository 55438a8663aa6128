//! HTTP surface and query client
//!
//! The server side exposes the directory over a small wire contract:
//!
//! ```text
//! PUT    /{hostname}                   ingest catalog      -> 204
//! DELETE /{hostname}                   remove host         -> 204 | 404
//! GET    /?resource=<ref-or-type>      declaring hostnames -> 200 YAML
//! GET    /?resource=...&parameters=1   title -> parameters -> 200 YAML
//! GET    /_health                      liveness            -> 200 YAML
//! ```
//!
//! The client side is what catalog compilations link against to push
//! catalogs and ask reverse-lookup questions.

pub mod api;
pub mod client;
pub mod server;

// Re-export main types
pub use api::{create_router, AppState, CONTENT_TYPE_YAML};
pub use client::{ClientConfig, ClientError, DirectoryClient, ParameterMapping, QuerySession};
pub use server::{DirectoryServer, ServeError};
