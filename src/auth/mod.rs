//! auth
//!
//! Personal access token checks.
//!
//! Tokens are supplied by the user (config file or `$GITHUB_TOKEN`); this
//! module only verifies that a token is accepted by GitHub and carries a
//! scope that allows pushing commits.
//!
//! # Security
//!
//! Tokens never appear in logs, error messages or JSON output.
//!
//! # Example
//!
//! ```ignore
//! use autocommitter::auth::TokenValidator;
//!
//! let validator = TokenValidator::new()?;
//! let result = validator.validate(&token).await?;
//! if !result.valid {
//!     eprintln!("{}", result.reason.unwrap_or_default());
//! }
//! ```

mod validator;

pub use validator::{
    has_commit_scope, parse_scopes, TokenValidation, TokenValidator, REQUIRED_SCOPES,
};
