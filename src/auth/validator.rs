//! auth::validator
//!
//! Checks that a personal access token can push commits.
//!
//! # Rules
//!
//! `GET /user` with the token, then read the `x-oauth-scopes` response
//! header. The token is usable only if its scopes include `repo` or
//! `public_repo`. Rejections are reported in the returned
//! [`TokenValidation`], not as errors:
//!
//! - 401: "Invalid or expired token"
//! - 403: "Token does not have sufficient permissions"
//! - other non-success: the API's `message`, or `GitHub API error: <status>`
//!
//! Only transport failures (timeouts, connection errors) are returned as
//! `Err`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::forge::github::{
    api_headers, error_message, http_client, transport_error, DEFAULT_API_BASE, DEFAULT_TIMEOUT,
};
use crate::forge::ForgeError;

/// Scopes that grant commit access.
pub const REQUIRED_SCOPES: &[&str] = &["repo", "public_repo"];

/// Response header listing a classic token's scopes.
const SCOPES_HEADER: &str = "x-oauth-scopes";

/// Outcome of validating a token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenValidation {
    pub valid: bool,
    /// Login of the token's owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Display name of the token's owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub scopes: Vec<String>,
    /// Why the token is not usable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TokenValidation {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Validates tokens against the GitHub API.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    client: Client,
    api_base: String,
}

impl TokenValidator {
    /// A validator for `api.github.com` with the default timeout.
    pub fn new() -> Result<Self, ForgeError> {
        Self::with_options(DEFAULT_API_BASE, DEFAULT_TIMEOUT)
    }

    pub fn with_options(api_base: impl Into<String>, timeout: Duration) -> Result<Self, ForgeError> {
        let api_base: String = api_base.into();
        Ok(Self {
            client: http_client(timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Validate `token`.
    pub async fn validate(&self, token: &str) -> Result<TokenValidation, ForgeError> {
        if token.trim().is_empty() {
            return Ok(TokenValidation::rejected("Token is required"));
        }
        let headers = match api_headers(token) {
            Ok(headers) => headers,
            Err(_) => return Ok(TokenValidation::rejected("Token contains invalid characters")),
        };

        let url = format!("{}/user", self.api_base);
        tracing::debug!(url = %url, "validating token");
        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status {
                StatusCode::UNAUTHORIZED => "Invalid or expired token".to_string(),
                StatusCode::FORBIDDEN => "Token does not have sufficient permissions".to_string(),
                _ => error_message(response, status).await,
            };
            tracing::debug!(status = status.as_u16(), %reason, "token rejected");
            return Ok(TokenValidation::rejected(reason));
        }

        let scopes = response
            .headers()
            .get(SCOPES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(parse_scopes)
            .unwrap_or_default();
        let user: GitHubUser = response.json().await.map_err(|e| ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("Failed to parse response: {}", e),
        })?;

        if !has_commit_scope(&scopes) {
            return Ok(TokenValidation {
                valid: false,
                login: Some(user.login),
                name: user.name,
                scopes,
                reason: Some(
                    "Token does not have required 'repo' permissions. \
                     Create a new token with 'repo' scope."
                        .to_string(),
                ),
            });
        }

        Ok(TokenValidation {
            valid: true,
            login: Some(user.login),
            name: user.name,
            scopes,
            reason: None,
        })
    }
}

/// Split a comma-separated scope header.
pub fn parse_scopes(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `scopes` grant commit access.
pub fn has_commit_scope(scopes: &[String]) -> bool {
    scopes
        .iter()
        .any(|scope| REQUIRED_SCOPES.contains(&scope.as_str()))
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
}
