//! Relay CLI - route completion requests across multiple AI providers
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands, ConfigAction};
use handlers::GenerateOptions;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_routing=warn,relay_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Generate {
            prompt,
            strategy,
            system,
            max_tokens,
            temperature,
            stats,
            json,
        } => {
            let config = handlers::load_config(cli.config.as_deref())?;
            let options = GenerateOptions {
                prompt,
                strategy,
                system,
                max_tokens,
                temperature,
                stats,
                json,
            };
            handlers::handle_generate(config, options).await?
        }
        Commands::Providers => {
            handlers::handle_providers(handlers::load_config(cli.config.as_deref())?)?
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => handlers::handle_config_init(cli.config, force)?,
            ConfigAction::Show => {
                handlers::handle_config_show(&handlers::load_config(cli.config.as_deref())?)?
            }
        },
    };

    #[allow(clippy::print_stdout, reason = "Command output")]
    {
        println!("{output}");
    }

    Ok(())
}
