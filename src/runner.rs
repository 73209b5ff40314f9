//! Command construction helpers.
//!
//! This module *builds* the child-process invocations for the AWS CLI and
//! Terraform.  It does not execute anything; execution lives in
//! [`crate::ui`] so the spinner can own the terminal while commands run.
//!
//! Every builder is pure, so the exact argument vectors are unit-tested
//! without either tool installed.

use std::path::{Path, PathBuf};

use crate::error::BackendError;

/// One child process: argv, optional working directory, extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Working directory of the child.  `None` inherits ours.
    pub dir: Option<PathBuf>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    fn new(program: &Path, args: &[&str]) -> Self {
        let mut argv = vec![program.to_string_lossy().into_owned()];
        argv.extend(args.iter().map(|a| (*a).to_string()));
        Self {
            argv,
            dir: None,
            env: Vec::new(),
        }
    }

    fn in_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    fn with_profile(mut self, profile: Option<&str>) -> Self {
        if let Some(p) = profile {
            self.env.push(("AWS_PROFILE".into(), p.into()));
        }
        self
    }

    /// The command line as a single display string.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

// ─── Tool lookup ──────────────────────────────────────────────────────────────

/// Resolve `bin` on `PATH` (or as a path, if it contains a separator).
pub fn locate(bin: &str, hint: &str) -> Result<PathBuf, BackendError> {
    which::which(bin).map_err(|e| BackendError::preflight(format!("'{bin}' not found: {e}"), hint))
}

// ─── aws ──────────────────────────────────────────────────────────────────────

/// `aws sts get-caller-identity --output json`
pub fn identity_check(aws: &Path, profile: Option<&str>) -> Invocation {
    Invocation::new(aws, &["sts", "get-caller-identity", "--output", "json"]).with_profile(profile)
}

// ─── terraform ────────────────────────────────────────────────────────────────

/// `terraform version`
pub fn terraform_version(terraform: &Path) -> Invocation {
    Invocation::new(terraform, &["version"])
}

/// `terraform init`, run inside `workdir`.
pub fn terraform_init(terraform: &Path, workdir: &Path, profile: Option<&str>) -> Invocation {
    Invocation::new(terraform, &["init"])
        .in_dir(workdir)
        .with_profile(profile)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_check_args() {
        let inv = identity_check(Path::new("aws"), None);
        insta::assert_debug_snapshot!(inv.argv, @r#"
        [
            "aws",
            "sts",
            "get-caller-identity",
            "--output",
            "json",
        ]
        "#);
        assert!(inv.dir.is_none());
        assert!(inv.env.is_empty());
    }

    #[test]
    fn identity_check_exports_profile() {
        let inv = identity_check(Path::new("/usr/bin/aws"), Some("ci"));
        assert_eq!(inv.argv[0], "/usr/bin/aws");
        assert_eq!(inv.env, vec![("AWS_PROFILE".to_string(), "ci".to_string())]);
    }

    #[test]
    fn terraform_version_args() {
        let inv = terraform_version(Path::new("tofu"));
        assert_eq!(inv.argv, vec!["tofu", "version"]);
    }

    #[test]
    fn terraform_init_runs_in_workdir() {
        let inv = terraform_init(
            Path::new("terraform"),
            Path::new("/tmp/env_prod_app.tfstate"),
            Some("default"),
        );
        assert_eq!(inv.argv, vec!["terraform", "init"]);
        assert_eq!(inv.dir.as_deref(), Some(Path::new("/tmp/env_prod_app.tfstate")));
        assert_eq!(inv.env, vec![("AWS_PROFILE".to_string(), "default".to_string())]);
    }

    #[test]
    fn display_joins_argv() {
        let inv = terraform_version(Path::new("terraform"));
        assert_eq!(inv.display(), "terraform version");
    }

    #[test]
    fn locate_finds_sh() {
        assert!(locate("sh", "install a shell").is_ok());
    }

    #[test]
    fn locate_missing_tool_is_preflight_error() {
        let err = locate("definitely-not-a-real-tool-xyz", "install it").unwrap_err();
        assert!(matches!(err, BackendError::Preflight { .. }));
        assert!(err.to_string().contains("hint: install it"));
    }
}
