pub mod cli;
pub mod controllers;
pub mod core;
pub mod routes;
pub mod token;
pub mod utils;

#[cfg(test)]
mod testing;

use clap::Parser;

use crate::cli::Cli;
use crate::core::config::Args;
use crate::core::error::ConfigError as Error;

pub use crate::controllers::user::{User, UserController};
pub use crate::core::client::ApiClient;
pub use crate::core::error::{ConfigError, Error as ClientError};
pub use crate::core::notice::{Notifier, TracingNotifier};
pub use crate::core::refresh::RefreshCoordinator;
pub use crate::core::state::Session;
pub use crate::routes::{Navigator, RouteClass, RouteClassifier, RouteRule, StaticNavigator};
pub use crate::token::storage::{FileStore, KeyValueStore, MemoryStore, Scope};
pub use crate::token::store::{AccessToken, TokenKind, TokenStore};

pub async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut config = Args::from_env()?;

    if let Some(location) = &cli.location {
        config.location = location.clone();
    }

    cli::init_logging(&config);

    tracing::debug!("Using API at {}", config.api_url);

    cli::execute(cli, config).await
}
