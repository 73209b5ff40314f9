//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  The `Cli` struct is parsed once in `main` and then
//! passed (by reference) into the command handlers.

use std::path::PathBuf;

use clap::Parser;

use crate::backend::parse_value;

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name    = "tf-backend",
    about   = "Scaffold and list Terraform S3 backends",
    version,
    arg_required_else_help = true,
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Cli {
    /// Path to the per-project configuration file.
    ///
    /// Merged on top of `~/.config/tf-backend/config.toml`.  Either file may
    /// be absent.
    #[arg(short, long, default_value = "tf-backend.toml")]
    pub config: PathBuf,

    /// Print the merged configuration and exit without running anything.
    #[arg(long)]
    pub print_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Write an S3 backend block into a fresh working directory and run
    /// `terraform init` there.
    ///
    /// The working directory is named after the state key with every `/`
    /// replaced by `_`, e.g. `env/prod/app.tfstate` → `env_prod_app.tfstate`.
    Init(InitArgs),

    /// Scan a directory tree for `.tf` files and list their S3 backends.
    List(ListArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// S3 bucket holding the state.
    #[arg(long, value_parser = parse_value)]
    pub bucket: String,

    /// Object key of the state file, e.g. `env/prod/app.tfstate`.
    #[arg(long, visible_alias = "state", value_parser = parse_value)]
    pub key: String,

    /// AWS region of the bucket.  Defaults to `[init].region` (us-east-1).
    #[arg(long, value_parser = parse_value)]
    pub region: Option<String>,

    /// AWS CLI profile.  Falls back to `$AWS_PROFILE`, then `[init].profile`.
    #[arg(long, value_parser = parse_value)]
    pub profile: Option<String>,

    /// Directory in which the working directory is created.
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Print the working directory and backend file, then exit without
    /// checking tools or touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    /// Root of the tree to scan.
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}
