//! toolmesh: let a language model call tools served by heterogeneous backends.
//!
//! Backends are either REST tool servers (`GET /health`, `GET /tools`, one
//! endpoint per tool) or native Model Context Protocol servers. Their tools
//! are merged into one [`registry::ToolRegistry`] and offered to a model by
//! the [`driver::ConversationDriver`], which runs a bounded tool-calling loop.
//!
//! # Quick Start
//!
//! ```no_run
//! use toolmesh::prelude::*;
//!
//! # async fn example() -> toolmesh::error::Result<()> {
//! let config = MeshConfig::from_env()?;
//! let mut client = ToolMeshClient::new(config)?;
//! client.initialize().await;
//! let outcome = client.process_query("Generate the renovation report").await?;
//! println!("{}", outcome.answer);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod prelude;
pub mod registry;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
