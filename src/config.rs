//! Configuration types and loading logic.
//!
//! Configuration is optional.  Two TOML files are read and merged per field,
//! the local one winning:
//!
//! 1. `<config_dir>/tf-backend/config.toml` (global defaults)
//! 2. `--config <path>`, default `./tf-backend.toml` (per-project overrides)
//!
//! # File format
//!
//! ```toml
//! [init]
//! region        = "us-east-1"   # used when --region is not given
//! profile       = "default"     # used when neither --profile nor $AWS_PROFILE is set
//! profile_field = true          # write `profile = "…"` into backend.tf
//! backend_file  = "backend.tf"
//! aws_bin       = "aws"
//! terraform_bin = "terraform"   # or "tofu"
//!
//! [list]
//! exclude_dirs = [".terraform"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::BackendError;

/// Region written when neither `--region` nor `[init].region` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Profile written when nothing else names one.
pub const DEFAULT_PROFILE: &str = "default";

// ─── Resolved config ─────────────────────────────────────────────────────────

/// Fully-resolved configuration; every field has a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub init: InitConfig,
    pub list: ListConfig,
}

/// Defaults for `tf-backend init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitConfig {
    pub region: String,
    pub profile: String,

    /// Write a `profile` field into the generated backend block.
    pub profile_field: bool,

    /// Name of the generated file inside the working directory.
    pub backend_file: String,

    pub aws_bin: String,
    pub terraform_bin: String,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            profile: DEFAULT_PROFILE.into(),
            profile_field: true,
            backend_file: "backend.tf".into(),
            aws_bin: "aws".into(),
            terraform_bin: "terraform".into(),
        }
    }
}

/// Defaults for `tf-backend list`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListConfig {
    /// Directory names that are never descended into.
    pub exclude_dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        PartialConfig::default().resolve()
    }
}

// ─── Partial config (as read from disk) ──────────────────────────────────────

/// One config file as written by the user: every field optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PartialConfig {
    #[serde(default)]
    pub init: PartialInitConfig,
    #[serde(default)]
    pub list: PartialListConfig,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PartialInitConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub profile_field: Option<bool>,
    pub backend_file: Option<String>,
    pub aws_bin: Option<String>,
    pub terraform_bin: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PartialListConfig {
    pub exclude_dirs: Option<Vec<String>>,
}

impl PartialConfig {
    /// Overlay `local` on top of `self`; local values win field by field.
    pub fn merge(self, local: Self) -> Self {
        Self {
            init: PartialInitConfig {
                region: local.init.region.or(self.init.region),
                profile: local.init.profile.or(self.init.profile),
                profile_field: local.init.profile_field.or(self.init.profile_field),
                backend_file: local.init.backend_file.or(self.init.backend_file),
                aws_bin: local.init.aws_bin.or(self.init.aws_bin),
                terraform_bin: local.init.terraform_bin.or(self.init.terraform_bin),
            },
            list: PartialListConfig {
                exclude_dirs: local.list.exclude_dirs.or(self.list.exclude_dirs),
            },
        }
    }

    /// Fill the gaps with built-in defaults.
    pub fn resolve(self) -> Config {
        let d = InitConfig::default();
        Config {
            init: InitConfig {
                region: self.init.region.unwrap_or(d.region),
                profile: self.init.profile.unwrap_or(d.profile),
                profile_field: self.init.profile_field.unwrap_or(d.profile_field),
                backend_file: self.init.backend_file.unwrap_or(d.backend_file),
                aws_bin: self.init.aws_bin.unwrap_or(d.aws_bin),
                terraform_bin: self.init.terraform_bin.unwrap_or(d.terraform_bin),
            },
            list: ListConfig {
                exclude_dirs: self.list.exclude_dirs.unwrap_or_default(),
            },
        }
    }
}

impl Config {
    /// Reject values that would make a later step misbehave.
    pub fn validate(&self) -> Result<(), BackendError> {
        let file = &self.init.backend_file;
        let plain = !file.is_empty()
            && !file.contains(['/', '\\'])
            && file != "."
            && file != "..";
        if !plain {
            return Err(BackendError::Config(format!(
                "[init].backend_file must be a plain file name, got '{file}'"
            )));
        }
        for (name, value) in [
            ("aws_bin", &self.init.aws_bin),
            ("terraform_bin", &self.init.terraform_bin),
        ] {
            if value.trim().is_empty() {
                return Err(BackendError::Config(format!("[init].{name} must not be empty")));
            }
        }
        Ok(())
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Read one config file.  `Ok(None)` when the file does not exist.
///
/// Returns an error if the file exists but cannot be read or is not valid
/// TOML.
pub fn parse_partial(path: &Path) -> Result<Option<PartialConfig>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found");
        return Ok(None);
    }

    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let partial = toml::from_str(&text)
        .map_err(|e| BackendError::Config(format!("parsing {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(partial))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
