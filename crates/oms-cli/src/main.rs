//! OMS CLI - browse the object tree as a given principal.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`OMS_*`)
//! 3. Explicit config file (`--config`)
//! 4. Project config (`.oms/config.toml` in the project root)
//! 5. Global config (`~/.oms/config.toml`)
//! 6. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `OMS_ENFORCE_ATTRIBUTE_RIGHTS`: reject undeclared attributes (`true`/`false`)
//! - `OMS_LOG_LEVEL`: default log filter when `RUST_LOG` is unset
//! - `OMS_INIT_CMDLINE`: command line recorded for task 1

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use oms_runtime::{ConfigLoader, Oms, OmsConfig};
use oms_types::{Principal, TaskId};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// OMS CLI - browse the object tree as a given principal
#[derive(Parser, Debug)]
#[command(name = "oms")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Act as this user instead of the system principal
    #[arg(short, long)]
    user: Option<String>,

    /// Extra config file layered over global and project config
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Let undeclared attribute accesses through (logged only)
    #[arg(long)]
    audit: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a container
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a node's readable attributes as JSON
    Cat {
        #[arg(default_value = "/")]
        path: String,
        /// Print the stored snapshot instead (system principal only)
        #[arg(long)]
        raw: bool,
    },
    /// List live tasks
    Ps,
}

fn resolve_config(args: &Args) -> Result<OmsConfig> {
    let project_root = args.project.clone().unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to get current directory, using '.'");
            PathBuf::from(".")
        })
    });

    let mut loader = ConfigLoader::new().with_project_root(project_root);
    if let Some(ref path) = args.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load()?;

    // CLI args override (highest priority)
    if args.debug {
        config.log.level = "debug".into();
    }
    if args.audit {
        config.auth.enforce_attribute_rights_definition = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args).map_err(|e| anyhow::anyhow!("Config error: {e}"))?;

    // --debug > RUST_LOG > config
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level))
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    let oms = Oms::builder().with_config(config).build()?;
    let principal = match args.user {
        Some(ref name) => Principal::user(name.as_str()),
        None => Principal::System,
    };
    info!(%principal, mode = ?oms.permissions().mode(), "session started");

    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
    let task = oms.procs().register_detached(&cmdline, TaskId::INIT)?;

    let interaction = oms.interaction(principal);
    let root = oms.secure_root(&interaction);
    let mut out = io::stdout().lock();
    let result = match args.command {
        Command::Ls { ref path } => root
            .traverse(path)
            .map_err(anyhow::Error::from)
            .and_then(|node| commands::ls(&node, &mut out)),
        Command::Cat { ref path, raw } => root
            .traverse(path)
            .map_err(anyhow::Error::from)
            .and_then(|node| {
                if raw {
                    commands::snapshot(&node, &mut out)
                } else {
                    commands::cat(&oms, &node, &mut out)
                }
            }),
        Command::Ps => commands::ps(&root, &mut out),
    };

    oms.procs().unregister(task)?;
    result
}
