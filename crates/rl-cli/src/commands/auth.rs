//! Login and logout: manage the stored credentials file

use anyhow::{Context, Result};

use rl_core::AuthCredentials;

use crate::client::ClientContext;
use crate::output::{print_info, print_success};

/// Store credentials for later connects
pub fn login_command(context: &ClientContext, token: &str, user_id: &str) -> Result<()> {
    let credentials = AuthCredentials::new(token.trim(), user_id.trim());
    if credentials.is_empty() {
        anyhow::bail!("Token must not be empty");
    }

    let store = context.credentials_file();
    store
        .save(&credentials)
        .with_context(|| format!("Failed to write credentials: {:?}", store.path()))?;

    print_success(&format!("Signed in as {}", credentials.user_id));
    print_info(&format!("Credentials stored at {:?}", store.path()));
    Ok(())
}

/// Remove stored credentials
pub fn logout_command(context: &ClientContext) -> Result<()> {
    let store = context.credentials_file();
    store
        .clear()
        .with_context(|| format!("Failed to remove credentials: {:?}", store.path()))?;

    print_success("Signed out");
    Ok(())
}
