//! cli::commands::validate_token
//!
//! Check that the configured token can push commits.

use anyhow::{bail, Result};

use super::require_token;
use crate::auth::TokenValidator;
use crate::cli::Context;
use crate::ui::output;

/// Run the validate-token command.
pub async fn validate_token(ctx: &Context) -> Result<()> {
    let token = require_token(ctx)?;
    let validator = TokenValidator::with_options(ctx.config.api_base(), ctx.config.timeout())?;
    let result = validator.validate(&token).await?;

    if ctx.json {
        output::json(&result)?;
    } else if result.valid {
        output::print(
            output::format_fields(&[
                ("user", result.login.clone().unwrap_or_default()),
                ("name", result.name.clone().unwrap_or_default()),
                ("scopes", result.scopes.join(", ")),
            ]),
            ctx.verbosity,
        );
        output::print("Token is valid.", ctx.verbosity);
        if !result.scopes.iter().any(|s| s == "repo") {
            output::warn(
                "token only grants public_repo; private repositories will be rejected",
                ctx.verbosity,
            );
        }
    }

    if !result.valid {
        bail!(
            "{}",
            result.reason.unwrap_or_else(|| "invalid token".to_string())
        );
    }
    Ok(())
}
