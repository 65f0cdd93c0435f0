//! core
//!
//! Core domain types, schemas, and generated content.
//!
//! # Modules
//!
//! - [`types`] - Strong types: RepositoryRef, FileChange, CommitResult, etc.
//! - [`config`] - Configuration schema and loading
//! - [`content`] - File content generators for scheduled commits
//! - [`log`] - Per-attempt commit records, sinks and statistics
//!
//! # Design Principles
//!
//! - Strong typing rejects malformed input before any request is built
//! - Schemas are strict and self-describing
//! - Content generation is deterministic given its inputs

pub mod config;
pub mod content;
pub mod log;
pub mod types;
