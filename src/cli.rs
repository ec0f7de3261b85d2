//! Command-line host for the authorized client.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::controllers::user::UserController;
use crate::core::client::ApiClient;
use crate::core::config::Args;
use crate::core::error::{ConfigError, Error};
use crate::core::notice::TracingNotifier;
use crate::routes::StaticNavigator;
use crate::token::storage::{FileStore, MemoryStore};
use crate::token::store::TokenStore;

#[derive(Parser, Debug)]
#[command(name = "donacore", about = "Authorized client for the donation API")]
pub struct Cli {
    /// View the request is made from; decides between redirect and anonymous fallback
    #[arg(long, global = true)]
    pub location: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the issued tokens
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "DONACORE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget every stored token
    Logout,
    /// Show the signed-in user
    Me,
    /// GET an API path and print the JSON body
    Get { path: String },
}

pub(crate) fn init_logging(config: &Args) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_level).unwrap_or_default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub(crate) async fn execute(cli: Cli, config: Args) -> Result<(), ConfigError> {
    let durable = FileStore::open(config.storage_path())?;
    tracing::debug!("Credentials stored in {}", durable.path().display());

    let tokens = TokenStore::new(
        Arc::new(durable),
        Arc::new(MemoryStore::new()),
        config.access_aliases(),
        config.refresh_aliases(),
    );

    let navigator = Arc::new(StaticNavigator::new(config.location.clone()));
    let client = ApiClient::new(&config, tokens, navigator.clone(), Arc::new(TracingNotifier))?;
    let users = UserController::new(client.clone());

    match cli.command {
        Command::Login { email, password } => {
            // signing in happens on the login view
            navigator.set_location(config.login_path.clone());

            let user = users.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        Command::Logout => {
            users.logout()?;
            println!("Signed out");
        }
        Command::Me => match users.current_user().await? {
            Some(user) => println!("{}", pretty(&user)?),
            None => println!("Not signed in"),
        },
        Command::Get { path } => {
            let body: Value = client.get_json(&path).await?;
            println!("{}", pretty(&body)?);
        }
    }

    Ok(())
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(value)?)
}
