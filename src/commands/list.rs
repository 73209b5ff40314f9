//! `tf-backend list` — print every S3 backend declared under a directory.

use std::io::Write;

use anyhow::{Context, Result};

use crate::{cli::ListArgs, config::ListConfig, error::BackendError, scanner, ui};

pub fn run(args: &ListArgs, cfg: &ListConfig) -> Result<()> {
    let root = &args.dir;
    if !root.exists() {
        return Err(BackendError::usage(format!(
            "directory '{}' does not exist",
            root.display()
        ))
        .into());
    }
    if !root.is_dir() {
        return Err(
            BackendError::usage(format!("'{}' is not a directory", root.display())).into(),
        );
    }

    let records = scanner::scan_tree(root, &cfg.exclude_dirs);
    tracing::info!(root = %root.display(), count = records.len(), "scan complete");

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(ui::render_backend_table(root, &records).as_bytes())
        .context("writing table to stdout")?;
    Ok(())
}
