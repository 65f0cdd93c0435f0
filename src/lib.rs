//! Autocommitter - publish commits to GitHub through the Git Data API
//!
//! A commit is built remotely, without a local clone: one blob per file, a
//! tree layered on the branch tip's tree, a commit pointing at the tip, and
//! finally a fast-forward update of the branch ref. The ref update is retried
//! when another writer moves the branch first.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Publish pipeline, ref update state machine, scheduler
//! - [`core`] - Domain types, configuration, content generators, commit log
//! - [`forge`] - Git Data API abstraction, GitHub client and in-memory mock
//! - [`auth`] - Token validation
//! - [`ui`] - Terminal output
//!
//! # Guarantees
//!
//! 1. Input is validated before any network call
//! 2. A branch ref only ever moves by fast-forward
//! 3. Every publish returns a result or a typed error, never a partial success

pub mod auth;
pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod ui;
