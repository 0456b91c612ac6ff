//! Search command implementation

use std::path::Path;

use anyhow::{Context, Result};

use rl_client::SearchStatus;
use rl_core::time::elapsed_duration;
use rl_protocol::{Delivery, Location};

use crate::client::{connect_with_retries, ClientContext};
use crate::output::{
    describe_outcome, format_outcome, print_error, print_info, print_success, print_warning,
};

/// Read a delivery from a JSON file (must carry `_id`)
fn read_delivery(path: &Path) -> Result<Delivery> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read delivery file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid delivery JSON in {:?}", path))
}

/// Run one delivery search to its outcome
///
/// Returns the terminal status. Ctrl-C cancels the search.
pub async fn search_command(
    context: &ClientContext,
    delivery_file: &Path,
    pickup: Location,
    retries: u32,
) -> Result<SearchStatus> {
    let delivery = read_delivery(delivery_file)?;
    let delivery_id = delivery.id.clone();

    let coordinator = context.coordinator();
    connect_with_retries(&coordinator, context, retries).await?;

    let mut session = coordinator.subscribe();
    let mut connection = coordinator.connection();

    coordinator
        .create_delivery_and_search(delivery, pickup)
        .await
        .with_context(|| format!("Failed to start search for {}", delivery_id))?;

    tracing::debug!(delivery_id = %delivery_id, "Search request sent");
    print_info(&format!("Searching for a rider for {}...", delivery_id));
    let mut last_count = None;

    let outcome = loop {
        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() {
                    break coordinator.session();
                }
                let current = session.borrow_and_update().clone();
                if current.status().is_terminal() {
                    break current;
                }
                if last_count != Some(current.nearby_count()) {
                    last_count = Some(current.nearby_count());
                    print_info(&format!("{} riders nearby", current.nearby_count()));
                }
            }
            changed = connection.changed() => {
                let lost = changed.is_err() || !connection.borrow_and_update().is_connected();
                if lost {
                    let reason = coordinator
                        .manager()
                        .status()
                        .error
                        .unwrap_or_else(|| "connection closed".to_string());
                    coordinator.disconnect().await;
                    anyhow::bail!("Lost connection during search: {}", reason);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                print_warning("Cancelling search...");
                if let Err(e) = coordinator.cancel_delivery_search().await {
                    print_error(&format!("Cancel failed: {}", e));
                }
                break coordinator.session();
            }
        }
    };

    let status = outcome.status();
    tracing::debug!(delivery_id = %delivery_id, %status, "Search finished");
    match status {
        SearchStatus::Assigned => print_success(describe_outcome(status)),
        SearchStatus::Errored => print_error(describe_outcome(status)),
        _ => print_warning(describe_outcome(status)),
    }
    let elapsed = outcome
        .started_at()
        .map(|started| elapsed_duration(started).as_secs())
        .unwrap_or_default();
    println!("{}", format_outcome(&outcome, elapsed));

    coordinator.disconnect().await;
    Ok(status)
}
