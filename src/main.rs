use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shopsync::presentation::cli_summary::{print_decision, print_warnings};
use shopsync::{
    init_tracing, AppConfig, ConflictResolver, LogLevel, Product, ProductShopData,
    ResolutionStrategy, ValidationEngine,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "shopsync",
    about = "Shopsync: inspect how PPM and shop records reconcile."
)]
struct Cli {
    /// TOML settings; `SHOPSYNC__*` environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a captured local product-shop record against a remote product.
    Resolve {
        /// Local record (JSON file).
        #[arg(long)]
        local: PathBuf,
        /// Remote product record (JSON file).
        #[arg(long)]
        remote: PathBuf,
        /// Overrides `sync.conflict_resolution`.
        #[arg(long)]
        strategy: Option<ResolutionStrategy>,
        /// Print the decision as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Validate a local product against a remote product.
    Validate {
        /// Local product (JSON file).
        #[arg(long)]
        product: PathBuf,
        /// Remote product record (JSON file).
        #[arg(long)]
        remote: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose {
        LogLevel::Debug
    } else if cli.quiet {
        LogLevel::Error
    } else {
        LogLevel::Info
    });

    let cfg = AppConfig::load(cli.config.as_deref())?;

    let needs_attention = match cli.command {
        Command::Resolve {
            local,
            remote,
            strategy,
            json,
        } => {
            let strategy = strategy.unwrap_or_else(|| cfg.sync.strategy());
            let local: ProductShopData = read_json(&local)?;
            let remote: Value = read_json(&remote)?;

            let decision =
                ConflictResolver::new(strategy, cfg.sync.language()).resolve(&local, &remote);
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
                decision.conflicts.is_some()
            } else {
                print_decision(&decision, strategy)
            }
        }
        Command::Validate {
            product,
            remote,
            json,
        } => {
            let product: Product = read_json(&product)?;
            let remote: Value = read_json(&remote)?;

            let engine = ValidationEngine::new(
                cfg.sync.language(),
                cfg.sync.default_price_group.clone(),
            );
            let warnings = engine.validate(&product, &remote);
            if json {
                println!("{}", serde_json::to_string_pretty(&warnings)?);
                warnings
                    .iter()
                    .any(|w| w.severity == shopsync::Severity::Error)
            } else {
                print_warnings(&warnings)
            }
        }
    };

    if needs_attention {
        std::process::exit(1);
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
