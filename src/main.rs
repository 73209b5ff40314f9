//! `tf-backend` — scaffold and list Terraform S3 backends.
//!
//! # Overview
//!
//! Two independent subcommands:
//!
//! - `init` checks that the AWS CLI and Terraform are installed and that the
//!   caller authenticates.  It then writes a `backend "s3"` block into a
//!   working directory named after the state key and runs `terraform init`
//!   there.
//! - `list` walks a directory tree and prints every S3 backend block it finds
//!   in `.tf` files.
//!
//! # Usage
//!
//! ```text
//! tf-backend init --bucket my-state --key env/prod/app.tfstate
//! tf-backend init --bucket my-state --state env/dev.tfstate --region eu-west-2 --profile dev
//! tf-backend list infra/
//! tf-backend --print-config
//! ```
//!
//! # Module layout
//!
//! | Module                   | Responsibility                              |
//! |--------------------------|---------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap               |
//! | [`config`]               | Optional TOML defaults, global + local      |
//! | [`backend`]              | Validated `BackendConfig` + rendering       |
//! | [`runner`]               | aws / terraform invocation builders         |
//! | [`scanner`]              | Idle/InBlock line scanner + tree walk       |
//! | [`ui`]                   | Spinner, captured execution, tables         |
//! | [`error`]                | `BackendError` taxonomy                     |
//! | [`commands::init`]       | `tf-backend init`                           |
//! | [`commands::list`]       | `tf-backend list`                           |

mod backend;
mod cli;
mod commands;
mod config;
mod error;
mod runner;
mod scanner;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use config::{Config, PartialConfig, parse_partial};
use error::BackendError;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and --version go to stdout and succeed; every usage error
        // exits 1 instead of clap's 2.
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            e.print()?;
            std::process::exit(1);
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cfg = load_merged_config(&cli.config)?;
    cfg.validate()?;

    if cli.print_config {
        println!("{cfg:#?}");
        return Ok(());
    }

    match &cli.command {
        // ── tf-backend init ───────────────────────────────────────────────────
        Some(Command::Init(args)) => {
            commands::init::run(args, &cfg.init)?;
        },

        // ── tf-backend list ───────────────────────────────────────────────────
        Some(Command::List(args)) => {
            commands::list::run(args, &cfg.list)?;
        },

        None => {
            return Err(BackendError::usage(
                "no command given; run 'tf-backend --help' for usage",
            )
            .into());
        },
    }

    Ok(())
}

/// Load configuration from two sources and merge them.
///
/// 1. `~/.config/tf-backend/config.toml` — global defaults
/// 2. `local_path` (default: `./tf-backend.toml`) — per-project overrides
///
/// Local values win on a per-field basis.  Either file may be absent.
fn load_merged_config(local_path: &std::path::Path) -> Result<Config> {
    let global_path = dirs_next::config_dir().map(|d| d.join("tf-backend").join("config.toml"));

    let global = match global_path.as_deref() {
        Some(p) => parse_partial(p)?.unwrap_or_default(),
        None => PartialConfig::default(),
    };
    let local = parse_partial(local_path)?.unwrap_or_default();

    Ok(global.merge(local).resolve())
}
