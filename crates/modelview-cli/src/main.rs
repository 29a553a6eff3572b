//! Modelview CLI - Main entry point
//!
//! Lists, inspects, re-exports and uploads glTF models from a terminal
//! using the same pipeline as the browser viewer.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "modelview")]
#[command(about = "glTF model inspection and export tool")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "modelview.toml")]
    config: PathBuf,

    /// Object-store bucket (overrides the configuration file)
    #[arg(short, long)]
    bucket: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List models in the object store
    List {
        /// Prefix to list instead of the configured one
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Print dimensions, hierarchy, mesh statistics and clips of a model
    Inspect {
        /// Local file or http(s) URL
        source: String,
    },
    /// Re-export a model as textual glTF
    Export {
        /// Local file or http(s) URL
        source: String,
        /// Output file name (".gltf" is appended when missing)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Re-export a model and upload it to the object store
    Upload {
        /// Local file or http(s) URL
        source: String,
        /// Object name (".gltf" is appended when missing)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Modelview v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Init = args.command {
        config::save_default_config(&args.config)?;
        println!("Wrote {}", args.config.display());
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if let Some(bucket) = args.bucket {
        config.store.bucket = bucket;
    }

    match args.command {
        Command::List { prefix } => commands::list(&config, prefix.as_deref()).await,
        Command::Inspect { source } => commands::inspect(&config, &source).await,
        Command::Export { source, output } => {
            commands::export(&config, &source, output.as_deref()).await
        }
        Command::Upload { source, name } => {
            commands::upload(&config, &source, name.as_deref()).await
        }
        Command::Init => Ok(()),
    }
}
