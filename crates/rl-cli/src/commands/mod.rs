//! CLI command implementations

mod auth;
mod config;
mod search;
mod status;
mod track;

pub use auth::{login_command, logout_command};
pub use config::{config_get, config_init, config_path, config_set, config_show};
pub use search::search_command;
pub use status::status_command;
pub use track::track_command;
