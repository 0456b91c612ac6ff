//! Track command implementation

use anyhow::{Context, Result};

use rl_protocol::DeliveryId;

use crate::client::{connect_with_retries, ClientContext};
use crate::output::print_success;

/// Ask the server to push live updates for a delivery
pub async fn track_command(context: &ClientContext, delivery_id: &str, retries: u32) -> Result<()> {
    let coordinator = context.coordinator();
    connect_with_retries(&coordinator, context, retries).await?;

    let result = coordinator
        .track_delivery(DeliveryId::new(delivery_id))
        .await
        .with_context(|| format!("Failed to track delivery {}", delivery_id));

    coordinator.disconnect().await;
    result?;

    print_success(&format!("Tracking delivery {}", delivery_id));
    Ok(())
}
