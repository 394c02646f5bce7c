use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::{bail, Result};

use crate::core::{Engine, STDIN_PATH};

#[derive(Parser)]
#[command(name = "reqsmith")]
#[command(about = "Infer the library versions a Python codebase is compatible with")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the effective configuration to a file for editing
    Init {
        /// Where to write the configuration
        #[arg(default_value = "Reqsmith.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Analyze a codebase and generate requirements.txt
    Analyze {
        /// Path to the codebase (directory, single file, or `-` for stdin)
        code_path: PathBuf,

        /// Output file path (defaults to the configured output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Signature catalog (JSON document or directory)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print the requirements without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the per-library usage aggregate as JSON
    Usage {
        /// Path to the codebase (directory, single file, or `-` for stdin)
        code_path: PathBuf,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Match a saved usage aggregate against the catalog
    Resolve {
        /// Usage JSON produced by `reqsmith usage`
        usage: PathBuf,

        /// Signature catalog (JSON document or directory)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Write requirements.txt here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List all libraries in the signature catalog
    List {
        /// Signature catalog (JSON document or directory)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Show signature catalog statistics
    Stats {
        /// Signature catalog (JSON document or directory)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path, force } => {
                engine.init(path, force).await
            }
            Commands::Analyze { code_path, output, catalog, dry_run } => {
                if code_path.as_os_str() != STDIN_PATH && !code_path.exists() {
                    bail!("Code path does not exist: {}", code_path.display());
                }
                let report = engine.analyze(code_path, output, catalog, dry_run).await?;
                if report.requirements.is_empty() {
                    println!("❌ No requirements generated");
                }
                Ok(())
            }
            Commands::Usage { code_path, output } => {
                if code_path.as_os_str() != STDIN_PATH && !code_path.exists() {
                    bail!("Code path does not exist: {}", code_path.display());
                }
                engine.usage(code_path, output).await.map(|_| ())
            }
            Commands::Resolve { usage, catalog, output } => {
                engine.resolve(usage, catalog, output).await.map(|_| ())
            }
            Commands::List { catalog } => {
                engine.list(catalog).await.map(|_| ())
            }
            Commands::Stats { catalog } => {
                engine.stats(catalog).await
            }
        }
    }
}
