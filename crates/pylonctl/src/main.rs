//! Pylon Control - CLI for the support reply pipeline
//!
//! Interactive test loop, one-shot queries and the offline sample tools
//! (generate, dedup, embed).

mod commands;
mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pylon_common::samples::DEFAULT_SAMPLE_TARGET;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pylonctl")]
#[command(about = "Bubbles AI Reply System - classify support queries and draft replies", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (overrides $PYLON_CONFIG and the default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the model API and messaging platform; every call takes its fallback
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive test loop (default)
    Repl,

    /// Classify, draft and deliver a reply for one query
    Ask {
        query: String,

        #[arg(long, default_value = repl::DUMMY_CONVERSATION_ID)]
        conversation_id: String,
    },

    /// Regenerate the sample query file from templates (old file is backed up)
    Generate {
        /// Output file (defaults to the configured path)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Number of samples to write
        #[arg(long, default_value_t = DEFAULT_SAMPLE_TARGET)]
        target: usize,

        /// Seed for a reproducible sample set
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Remove duplicate sample queries in place
    Dedup {
        /// Sample queries file (defaults to the configured path)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Precompute the sample embedding cache
    Embed {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,

        /// Drop duplicate samples before embedding
        #[arg(long)]
        dedup: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = commands::load_settings(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl::run(&settings, cli.offline),
        Commands::Ask {
            query,
            conversation_id,
        } => commands::ask(&settings, cli.offline, &query, &conversation_id),
        Commands::Generate { output, target, seed } => commands::generate(&settings, output, target, seed),
        Commands::Dedup { input } => commands::dedup(&settings, input),
        Commands::Embed {
            input,
            output,
            dedup,
        } => commands::embed(&settings, cli.offline, input, output, dedup),
    }
}
