use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

mod cli;
mod config;
mod markdown;
mod note;
mod pipeline;
mod provider;
mod quality;
mod retry;
mod semantic;
#[cfg(test)]
mod tests;
mod vault;

use cli::{Args, Command, ProviderArgs};
use config::Config;
use pipeline::{CancelToken, Linker, QualityPipeline, RunOptions, RunSummary};
use provider::OllamaClient;
use quality::QualityRater;
use retry::RetryPolicy;
use semantic::EmbeddingClient;
use vault::FsVault;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--vault` (or `VAULTLINK_VAULT`), else `VAULT_DIRECTORY`.
fn vault_root(args: &Args) -> Option<PathBuf> {
    if let Some(vault) = &args.vault {
        return Some(vault.clone());
    }
    match std::env::var("VAULT_DIRECTORY") {
        Ok(dir) if !dir.trim().is_empty() => Some(PathBuf::from(dir)),
        _ => None,
    }
}

fn apply_overrides(config: &mut Config, provider: &ProviderArgs, command: &Command) -> anyhow::Result<()> {
    if let Some(base_url) = &provider.base_url {
        // OLLAMA_HOST is commonly set as bare host:port
        config.provider.base_url = if base_url.contains("://") {
            base_url.clone()
        } else {
            format!("http://{base_url}")
        };
    }
    if let Some(jobs) = provider.jobs {
        config.provider.max_in_flight = jobs;
    }

    match command {
        Command::Link {
            max_related,
            min_score,
            model,
        } => {
            if let Some(max_related) = max_related {
                config.linker.max_related = *max_related;
            }
            if let Some(min_score) = min_score {
                config.linker.min_score = *min_score;
            }
            if let Some(model) = model {
                config.provider.embedding_model = model.clone();
            }
        }
        Command::Rate { model } => {
            if let Some(model) = model {
                config.provider.rating_model = model.clone();
            }
        }
        Command::Config {} => {}
    }

    config.validate()
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    let root = vault_root(&args);
    let mut config = Config::load(args.config.as_deref(), root.as_deref())?;
    apply_overrides(&mut config, &args.provider, &args.command)?;

    if let Command::Config {} = args.command {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let Some(root) = root else {
        bail!("no vault given: pass --vault or set VAULTLINK_VAULT");
    };

    let vault = FsVault::open(&root, &config.vault.exclude)
        .with_context(|| format!("failed to open vault {}", root.display()))?;
    log::info!("vault: {}", vault.root().display());
    let vault = Arc::new(vault);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("received interrupt, finishing in-flight requests");
        handler_token.cancel();
    })
    .context("failed to set Ctrl+C handler")?;

    let options = RunOptions {
        dry_run: args.dry_run,
        show_progress: !args.json && std::io::stderr().is_terminal(),
    };
    let retry = RetryPolicy::from(&config.retry);
    let workers = config.provider.max_in_flight;

    let summary = match args.command {
        Command::Link { .. } => {
            let provider = OllamaClient::for_embeddings(&config.provider)
                .context("failed to build embedding client")?;
            let embedder = EmbeddingClient::new(Arc::new(provider), retry);
            Linker::new(vault, embedder, config.linker.clone(), workers).run(&options, &cancel)?
        }
        Command::Rate { .. } => {
            let provider = OllamaClient::for_rating(&config.provider, config.quality.json_mode)
                .context("failed to build rating client")?;
            let rater = QualityRater::new(Arc::new(provider), retry, config.quality.max_input_chars);
            QualityPipeline::new(vault, rater, workers).run(&options, &cancel)?
        }
        Command::Config {} => return Ok(()),
    };

    print_summary(&summary, args.json)?;
    if summary.has_failures() {
        log::warn!("some notes failed, see the summary");
    }

    if summary.cancelled {
        bail!("interrupted");
    }

    Ok(())
}
