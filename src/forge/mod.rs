//! forge
//!
//! Access to the remote Git Data API.
//!
//! # Architecture
//!
//! The [`GitData`] trait defines the object and ref operations a commit is
//! built from. The publisher only talks to the trait, so the protocol can
//! run against GitHub or against the in-memory mock.
//!
//! # Modules
//!
//! - `traits`: Core `GitData` trait, `ForgeError`, and response types
//! - `factory`: The `Connector` seam that creates clients per repository
//! - [`github`]: GitHub implementation over the REST API
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use autocommitter::core::types::RepositoryRef;
//! use autocommitter::forge::{github::GitHubClient, GitData};
//!
//! let repo = RepositoryRef::parse("https://github.com/owner/repo")?;
//! let api = GitHubClient::new(token, repo)?;
//! let info = api.get_repository().await?;
//! println!("default branch: {:?}", info.default_branch);
//! ```

mod factory;
pub mod github;
pub mod mock;
mod traits;

pub use factory::{Connector, GitHubConnector, MockConnector};
pub use traits::*;
