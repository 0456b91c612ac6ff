//! Status command implementation

use anyhow::Result;

use crate::client::ClientContext;
use crate::output::{format_connection, print_info, print_warning};

/// Try one connection and report what happened
pub async fn status_command(context: &ClientContext) -> Result<()> {
    let credentials = context.current_credentials().await;
    if credentials.is_none() {
        print_warning("Not signed in");
        print_info("Run 'rider-link login --token <TOKEN> --user-id <ID>' to sign in");
    }

    let coordinator = context.coordinator();
    coordinator.connect().await;

    let status = coordinator.manager().status();
    println!(
        "{}",
        format_connection(
            &context.config.server_url,
            &status,
            credentials.as_ref().map(|c| c.user_id.as_str()),
        )
    );

    coordinator.disconnect().await;
    Ok(())
}
