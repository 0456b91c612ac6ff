//! Output formatting utilities for the CLI
//!
//! Tables for connection and search state, plus coloured one-line status
//! messages.

use tabled::{settings::Style, Table, Tabled};

use rl_client::{SearchSession, SearchStatus};
use rl_core::ConnectionStatus;

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "FIELD")]
    field: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn row(field: &str, value: impl Into<String>) -> FieldRow {
    FieldRow {
        field: field.to_string(),
        value: value.into(),
    }
}

/// Format the connection status as a table
///
/// `user_id` is shown when credentials were found.
pub fn format_connection(
    server_url: &str,
    status: &ConnectionStatus,
    user_id: Option<&str>,
) -> String {
    let rows = vec![
        row("Server", server_url),
        row("Signed in as", user_id.unwrap_or("-")),
        row("State", status.state.to_string()),
        row(
            "Attempted",
            if status.connection_attempted { "yes" } else { "no" },
        ),
        row("Error", status.error.clone().unwrap_or_else(|| "-".to_string())),
    ];

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format the outcome of a finished search
pub fn format_outcome(session: &SearchSession, elapsed_secs: u64) -> String {
    let mut rows = vec![
        row("Outcome", session.status().to_string()),
        row("Riders nearby", session.nearby_count().to_string()),
        row("Elapsed", format_duration(elapsed_secs)),
    ];

    if let Some(error) = session.error() {
        rows.push(row("Error", truncate(error, 60)));
    }

    if let Some(delivery) = session.assigned_delivery() {
        rows.push(row("Delivery", delivery.id.to_string()));
        for (key, value) in &delivery.details {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rows.push(row(key, truncate(&value, 60)));
        }
    }

    Table::new(rows).with(Style::rounded()).to_string()
}

/// One-line summary for a terminal status
pub fn describe_outcome(status: SearchStatus) -> &'static str {
    match status {
        SearchStatus::Assigned => "A rider accepted the delivery",
        SearchStatus::NoRidersAvailable => "No riders are available right now",
        SearchStatus::AutoCancelled => "The search timed out on the server",
        SearchStatus::Cancelled => "The search was cancelled",
        SearchStatus::Errored => "The search failed",
        SearchStatus::Idle | SearchStatus::Searching => "The search has not finished",
    }
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}m {}s", mins, remaining_secs)
    } else {
        let hours = secs / 3600;
        let remaining_mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, remaining_mins)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
