//! The S3 backend value object and its rendered `backend.tf`.
//!
//! A [`BackendConfig`] is built exactly once from parsed input and never
//! mutated.  Construction is where validation happens: once a value exists,
//! every field is safe to drop into a double-quoted HCL string as-is.
//!
//! # Rendered file
//!
//! ```hcl
//! terraform {
//!   backend "s3" {
//!     bucket = "demo-bucket"
//!     key = "env/prod/app.tfstate"
//!     region = "us-east-1"
//!     profile = "default"
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use crate::error::BackendError;

/// Validated S3 backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    bucket: String,
    key: String,
    region: String,
    /// `None` when the profile field is disabled in config.
    profile: Option<String>,
}

impl BackendConfig {
    /// Validate and assemble a backend.
    ///
    /// Fails with [`BackendError::Usage`] if any field is empty, contains a
    /// character that would need escaping inside an HCL string, or if `key`
    /// maps to the working directory `.` or `..`.
    pub fn new(
        bucket: &str,
        key: &str,
        region: &str,
        profile: Option<&str>,
    ) -> Result<Self, BackendError> {
        validate_value("bucket", bucket)?;
        validate_value("key", key)?;
        validate_value("region", region)?;
        if let Some(p) = profile {
            validate_value("profile", p)?;
        }

        let dir = working_dir_name(key);
        if dir == "." || dir == ".." {
            return Err(BackendError::usage(format!(
                "key '{key}' does not name a usable working directory"
            )));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            region: region.to_string(),
            profile: profile.map(str::to_string),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Directory that scopes this backend, relative to `base`.
    pub fn working_dir(&self, base: &Path) -> PathBuf {
        base.join(working_dir_name(&self.key))
    }

    /// Render the `terraform { backend "s3" { … } }` block.
    pub fn render(&self) -> String {
        let mut out = String::from("terraform {\n  backend \"s3\" {\n");
        push_field(&mut out, "bucket", &self.bucket);
        push_field(&mut out, "key", &self.key);
        push_field(&mut out, "region", &self.region);
        if let Some(ref profile) = self.profile {
            push_field(&mut out, "profile", profile);
        }
        out.push_str("  }\n}\n");
        out
    }
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("    {name} = \"{value}\"\n"));
}

/// `key` with every `/` replaced by `_`.
pub fn working_dir_name(key: &str) -> String {
    key.replace('/', "_")
}

/// Reject values that are empty or would need escaping in an HCL string.
pub fn validate_value(field: &str, value: &str) -> Result<(), BackendError> {
    if value.trim().is_empty() {
        return Err(BackendError::usage(format!("{field} must not be empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| *c == '"' || *c == '\\' || c.is_control())
    {
        return Err(BackendError::usage(format!(
            "{field} contains a forbidden character {c:?}"
        )));
    }
    if value.contains("${") || value.contains("%{") {
        return Err(BackendError::usage(format!(
            "{field} must not contain a template sequence (\"${{\" or \"%{{\")"
        )));
    }
    Ok(())
}

/// clap `value_parser` wrapper around [`validate_value`].
pub fn parse_value(raw: &str) -> Result<String, String> {
    validate_value("value", raw)
        .map(|()| raw.to_string())
        .map_err(|e| e.to_string())
}
