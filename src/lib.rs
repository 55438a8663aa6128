//! relnodes - Reverse resource directory for configuration management
//!
//! Answers the question exported resources answer in a master-driven setup,
//! without a master: which hosts currently manage a given resource, and
//! with which parameters? Hosts push their compiled catalogs; the service
//! maintains a filesystem-sharded inverted index from resource references
//! and types to the declaring hostnames.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`] - validated hostname, reference, and query key types
//! - [`catalog`] - catalog document decoding and extraction
//! - [`index`] - sharded inverted index over the filesystem
//! - [`store`] - per-host raw catalog storage
//! - [`directory`] - ingest, delete, and query orchestration with diffing
//! - [`service`] - HTTP surface (axum) and the query client
//! - [`config`] - configuration management and settings
//! - [`error`] - unified error type
//!
//! # Example
//!
//! ```no_run
//! use relnodes::config::Config;
//! use relnodes::service::DirectoryServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = DirectoryServer::new(config)?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod directory;
pub mod error;
pub mod index;
pub mod models;
pub mod service;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{CatalogDocument, ParameterMap, Resource};
    pub use crate::config::Config;
    pub use crate::directory::ResourceDirectory;
    pub use crate::error::{Error, Result};
    pub use crate::models::{Hostname, QueryKey, ResourceRef};
    pub use crate::service::{DirectoryClient, DirectoryServer, QuerySession};
}

// Direct re-exports for convenience
pub use models::{Hostname, QueryKey, ResourceRef};
