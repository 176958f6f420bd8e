use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the relay binary
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Route completion requests across multiple AI providers", long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Config file to use [default: ~/.relay/config.toml]"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Generate a completion for a prompt")]
    Generate {
        #[arg(help = "The prompt to send")]
        prompt: String,

        #[arg(
            short,
            long,
            help = "Strategy override (primary-only, fallback-chain, parallel-comparison, cost-optimized)"
        )]
        strategy: Option<String>,

        #[arg(long, help = "System prompt")]
        system: Option<String>,

        #[arg(long, help = "Maximum completion tokens")]
        max_tokens: Option<u32>,

        #[arg(long, help = "Sampling temperature")]
        temperature: Option<f32>,

        #[arg(long, help = "Print routing statistics after the response")]
        stats: bool,

        #[arg(long, help = "Print the response as JSON")]
        json: bool,
    },

    #[command(about = "List configured providers")]
    Providers,

    #[command(about = "Manage the configuration file")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Print the effective configuration")]
    Show,
}
