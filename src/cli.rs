use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Vault directory
    #[clap(long, global = true, env = "VAULTLINK_VAULT")]
    pub vault: Option<PathBuf>,

    /// Config file (defaults to <vault>/.vaultlink.yaml when present)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Compute everything but don't write any note
    #[clap(long, global = true, default_value = "false")]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[clap(long, global = true, default_value = "false")]
    pub json: bool,

    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// Model server base url
    #[clap(long, global = true, env = "OLLAMA_HOST")]
    pub base_url: Option<String>,

    /// Provider requests in flight at once
    #[clap(short, long, global = true)]
    pub jobs: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a "Related Notes" section to every note
    Link {
        /// Most related notes listed per note
        #[clap(short = 'k', long)]
        max_related: Option<usize>,

        /// Minimum cosine similarity for a note to be listed
        #[clap(long, allow_hyphen_values = true)]
        min_score: Option<f32>,

        /// Embedding model
        #[clap(short, long)]
        model: Option<String>,
    },

    /// Rate every note and record score and feedback in it
    Rate {
        /// Completion model
        #[clap(short, long)]
        model: Option<String>,
    },

    /// Print the effective configuration
    Config {},
}
