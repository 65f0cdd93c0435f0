//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All command output goes through this module so quiet and JSON modes are
//! handled in one place. Diagnostics use `tracing` instead.

pub mod output;
