//! `tf-backend init` — scaffold an S3 backend and run `terraform init`.
//!
//! # Stages (in order)
//!
//! | # | Stage              | Kind      | On failure                         |
//! |---|--------------------|-----------|------------------------------------|
//! | 1 | Locate aws         | preflight | abort, nothing created             |
//! | 2 | Identity check     | preflight | abort, nothing created             |
//! | 3 | Locate terraform   | preflight | abort, nothing created             |
//! | 4 | Terraform version  | preflight | abort, nothing created             |
//! | 5 | Working directory  | mutation  | abort                              |
//! | 6 | Backend file       | mutation  | abort, directory left in place     |
//! | 7 | Terraform init     | mutation  | abort, directory and file left     |
//!
//! Every path is passed explicitly; `terraform init` gets the working
//! directory as its child `current_dir`.  Our own cwd never changes.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::Deserialize;

use crate::{
    backend::BackendConfig,
    cli::InitArgs,
    config::InitConfig,
    error::BackendError,
    runner::{self, Invocation},
    ui::{StageOutcome, print_summary, run_stage, task_stage},
};

const AWS_HINT: &str = "install the AWS CLI (https://aws.amazon.com/cli/) or set [init].aws_bin";
const IDENTITY_HINT: &str =
    "check your credentials: run `aws configure`, `aws sso login`, or pass --profile";
const TERRAFORM_HINT: &str =
    "install Terraform (https://developer.hashicorp.com/terraform/install) or set [init].terraform_bin";

// ─── Plan ─────────────────────────────────────────────────────────────────────

/// Everything `init` will do, resolved before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPlan {
    pub backend: BackendConfig,
    pub workdir: PathBuf,
    pub backend_path: PathBuf,
    /// Exported as `AWS_PROFILE` to the identity check and `terraform init`.
    /// Only an explicit `--profile` is exported; otherwise credentials
    /// resolve from the inherited environment.
    pub aws_profile: Option<String>,
}

/// Resolve flags, config, and `$AWS_PROFILE` into an [`InitPlan`].
///
/// Profile written to the file: `--profile`, then `env_profile`, then
/// `[init].profile`.  With `profile_field = false` nothing is written.
/// Either way only an explicit `--profile` is exported to children.
pub fn plan(
    args: &InitArgs,
    cfg: &InitConfig,
    env_profile: Option<String>,
) -> Result<InitPlan, BackendError> {
    let region = args.region.as_deref().unwrap_or(&cfg.region);

    let profile = cfg.profile_field.then(|| {
        args.profile
            .clone()
            .or(env_profile)
            .unwrap_or_else(|| cfg.profile.clone())
    });

    let backend = BackendConfig::new(&args.bucket, &args.key, region, profile.as_deref())?;
    let workdir = backend.working_dir(&args.base_dir);
    let backend_path = workdir.join(&cfg.backend_file);

    Ok(InitPlan {
        backend,
        workdir,
        backend_path,
        aws_profile: args.profile.clone(),
    })
}

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Run the full init pipeline and return the working directory.
pub fn run(args: &InitArgs, cfg: &InitConfig) -> Result<PathBuf> {
    let env_profile = std::env::var("AWS_PROFILE").ok().filter(|p| !p.is_empty());
    let plan = plan(args, cfg, env_profile)?;

    if args.dry_run {
        print_dry_run(&plan, cfg);
        return Ok(plan.workdir);
    }

    println!();
    let mut outcomes = Vec::new();
    let result = pipeline(&plan, cfg, &mut outcomes);
    print_summary(
        &outcomes,
        "Backend initialized.",
        "Backend initialization failed.",
    );
    result?;

    println!(
        "  State:             s3://{}/{} ({})",
        plan.backend.bucket(),
        plan.backend.key(),
        plan.backend.region()
    );
    if let Some(profile) = plan.backend.profile() {
        println!("  Profile:           {profile}");
    }
    println!("  Working directory: {}", plan.workdir.display());
    Ok(plan.workdir)
}

fn pipeline(
    plan: &InitPlan,
    cfg: &InitConfig,
    outcomes: &mut Vec<StageOutcome>,
) -> Result<(), BackendError> {
    let profile = plan.aws_profile.as_deref();

    // ── Preflight: nothing below may touch the filesystem ────────────────────

    let aws = record(outcomes, task_stage("Locate aws", || located(&cfg.aws_bin, AWS_HINT)))?;

    if !external(
        outcomes,
        "Identity check",
        &runner::identity_check(&aws, profile),
        caller_detail,
    ) {
        return Err(BackendError::preflight(
            "AWS identity check failed",
            IDENTITY_HINT,
        ));
    }

    let terraform = record(
        outcomes,
        task_stage("Locate terraform", || {
            located(&cfg.terraform_bin, TERRAFORM_HINT)
        }),
    )?;

    if !external(
        outcomes,
        "Terraform version",
        &runner::terraform_version(&terraform),
        first_line,
    ) {
        return Err(BackendError::preflight(
            format!("'{}' version failed", terraform.display()),
            TERRAFORM_HINT,
        ));
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    record(
        outcomes,
        task_stage("Working directory", || {
            fs::create_dir_all(&plan.workdir)
                .map(|()| ((), Some(plan.workdir.display().to_string())))
                .map_err(|e| {
                    BackendError::operation(format!("creating {}: {e}", plan.workdir.display()))
                })
        }),
    )?;

    record(
        outcomes,
        task_stage("Backend file", || {
            fs::write(&plan.backend_path, plan.backend.render())
                .map(|()| ((), Some(plan.backend_path.display().to_string())))
                .map_err(|e| {
                    BackendError::operation(format!(
                        "writing {}: {e}",
                        plan.backend_path.display()
                    ))
                })
        }),
    )?;

    if !external(
        outcomes,
        "Terraform init",
        &runner::terraform_init(&terraform, &plan.workdir, profile),
        |_| None,
    ) {
        return Err(BackendError::operation(format!(
            "terraform init failed; {} was left in place",
            plan.workdir.display()
        )));
    }

    Ok(())
}

// ─── Stage helpers ────────────────────────────────────────────────────────────

/// Print and keep `outcome`, passing the step's result through.
fn record<T>(
    outcomes: &mut Vec<StageOutcome>,
    (outcome, result): (StageOutcome, Result<T, BackendError>),
) -> Result<T, BackendError> {
    outcome.print();
    outcomes.push(outcome);
    result
}

/// Run an external command as a stage.  Returns `true` on success.
fn external(
    outcomes: &mut Vec<StageOutcome>,
    label: &str,
    inv: &Invocation,
    detail: fn(&str) -> Option<String>,
) -> bool {
    let mut outcome = run_stage(label, inv);
    if outcome.success {
        outcome.detail = detail(&outcome.stdout);
    }
    outcome.print();
    let ok = outcome.success;
    outcomes.push(outcome);
    ok
}

fn located(bin: &str, hint: &str) -> Result<(PathBuf, Option<String>), BackendError> {
    runner::locate(bin, hint).map(|p| {
        let shown = p.display().to_string();
        (p, Some(shown))
    })
}

/// Reply of `aws sts get-caller-identity --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
    arn: String,
}

fn caller_detail(stdout: &str) -> Option<String> {
    let id: CallerIdentity = serde_json::from_str(stdout).ok()?;
    Some(format!("{} (account {})", id.arn, id.account))
}

fn first_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

// ─── Dry run ──────────────────────────────────────────────────────────────────

fn print_dry_run(plan: &InitPlan, cfg: &InitConfig) {
    let profile = plan.aws_profile.as_deref();
    let aws = runner::identity_check(Path::new(&cfg.aws_bin), profile);
    let init = runner::terraform_init(Path::new(&cfg.terraform_bin), &plan.workdir, profile);

    println!("Working directory: {}", plan.workdir.display());
    println!("Backend file:      {}", plan.backend_path.display());
    println!("Identity check:    {}", aws.display());
    println!("Initialize:        {}", init.display());
    if let Some(p) = profile {
        println!("AWS_PROFILE:       {p}");
    }
    println!();
    print!("{}", plan.backend.render());
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: impl FnOnce(&mut InitArgs)) -> InitArgs {
        let mut a = InitArgs {
            bucket: "demo-bucket".into(),
            key: "env/prod/app.tfstate".into(),
            region: None,
            profile: None,
            base_dir: PathBuf::from("/base"),
            dry_run: false,
        };
        extra(&mut a);
        a
    }

    // ── plan ──────────────────────────────────────────────────────────────────

    #[test]
    fn plan_uses_default_region_and_profile() {
        let p = plan(&args(|_| {}), &InitConfig::default(), None).unwrap();
        assert_eq!(p.backend.region(), "us-east-1");
        assert_eq!(p.backend.profile(), Some("default"));
        assert_eq!(p.workdir, PathBuf::from("/base/env_prod_app.tfstate"));
        assert_eq!(
            p.backend_path,
            PathBuf::from("/base/env_prod_app.tfstate/backend.tf")
        );
    }

    #[test]
    fn defaulted_profile_is_written_but_not_exported() {
        let p = plan(&args(|_| {}), &InitConfig::default(), None).unwrap();
        assert_eq!(p.backend.profile(), Some("default"));
        assert_eq!(p.aws_profile, None);

        let aws = runner::identity_check(Path::new("aws"), p.aws_profile.as_deref());
        assert!(aws.env.is_empty());
        let init =
            runner::terraform_init(Path::new("terraform"), &p.workdir, p.aws_profile.as_deref());
        assert!(init.env.is_empty());
    }

    #[test]
    fn plan_region_flag_beats_config() {
        let cfg = InitConfig {
            region: "eu-west-2".into(),
            ..InitConfig::default()
        };
        assert_eq!(plan(&args(|_| {}), &cfg, None).unwrap().backend.region(), "eu-west-2");

        let a = args(|a| a.region = Some("ap-south-1".into()));
        assert_eq!(plan(&a, &cfg, None).unwrap().backend.region(), "ap-south-1");
    }

    #[test]
    fn plan_profile_precedence() {
        let cfg = InitConfig {
            profile: "from-config".into(),
            ..InitConfig::default()
        };
        let p = plan(&args(|_| {}), &cfg, None).unwrap();
        assert_eq!(p.backend.profile(), Some("from-config"));

        let p = plan(&args(|_| {}), &cfg, Some("from-env".into())).unwrap();
        assert_eq!(p.backend.profile(), Some("from-env"));
        assert_eq!(p.aws_profile, None);

        let a = args(|a| a.profile = Some("from-flag".into()));
        let p = plan(&a, &cfg, Some("from-env".into())).unwrap();
        assert_eq!(p.backend.profile(), Some("from-flag"));
        assert_eq!(p.aws_profile.as_deref(), Some("from-flag"));
    }

    #[test]
    fn plan_without_profile_field() {
        let cfg = InitConfig {
            profile_field: false,
            ..InitConfig::default()
        };
        let p = plan(&args(|_| {}), &cfg, Some("env".into())).unwrap();
        assert_eq!(p.backend.profile(), None);
        assert_eq!(p.aws_profile, None);
        assert!(!p.backend.render().contains("profile"));

        let a = args(|a| a.profile = Some("ci".into()));
        let p = plan(&a, &cfg, None).unwrap();
        assert_eq!(p.backend.profile(), None);
        assert_eq!(p.aws_profile.as_deref(), Some("ci"));
    }

    #[test]
    fn plan_honours_backend_file_name() {
        let cfg = InitConfig {
            backend_file: "s3.tf".into(),
            ..InitConfig::default()
        };
        let p = plan(&args(|_| {}), &cfg, None).unwrap();
        assert!(p.backend_path.ends_with("env_prod_app.tfstate/s3.tf"));
    }

    #[test]
    fn plan_rejects_empty_bucket() {
        let err = plan(&args(|a| a.bucket.clear()), &InitConfig::default(), None).unwrap_err();
        assert!(matches!(err, BackendError::Usage(_)));
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn caller_detail_parses_sts_reply() {
        let json = r#"{"UserId":"AIDA123","Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/ci"}"#;
        assert_eq!(
            caller_detail(json).as_deref(),
            Some("arn:aws:iam::123456789012:user/ci (account 123456789012)")
        );
    }

    #[test]
    fn caller_detail_tolerates_garbage() {
        assert!(caller_detail("").is_none());
        assert!(caller_detail("not json").is_none());
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(
            first_line("\n  Terraform v1.9.0\non linux_amd64\n").as_deref(),
            Some("Terraform v1.9.0")
        );
        assert!(first_line("").is_none());
    }

    // ── run ───────────────────────────────────────────────────────────────────

    fn in_tmp(base: &Path) -> InitArgs {
        args(|a| a.base_dir = base.to_path_buf())
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let a = args(|a| {
            a.base_dir = tmp.path().to_path_buf();
            a.dry_run = true;
        });
        let dir = run(&a, &InitConfig::default()).unwrap();
        assert_eq!(dir, tmp.path().join("env_prod_app.tfstate"));
        assert!(!dir.exists());
    }

    #[test]
    fn missing_aws_is_preflight_and_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = InitConfig {
            aws_bin: "/nonexistent/aws-xyz".into(),
            ..InitConfig::default()
        };
        let err = run(&in_tmp(tmp.path()), &cfg).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::Preflight { .. })
        ));
        assert!(!tmp.path().join("env_prod_app.tfstate").exists());
    }

    #[test]
    fn failed_identity_check_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = InitConfig {
            aws_bin: "false".into(),
            terraform_bin: "true".into(),
            ..InitConfig::default()
        };
        let err = run(&in_tmp(tmp.path()), &cfg).unwrap_err();
        assert!(err.to_string().contains("identity check failed"));
        assert!(!tmp.path().join("env_prod_app.tfstate").exists());
    }

    #[test]
    fn missing_terraform_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = InitConfig {
            aws_bin: "true".into(),
            terraform_bin: "/nonexistent/terraform-xyz".into(),
            ..InitConfig::default()
        };
        let err = run(&in_tmp(tmp.path()), &cfg).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::Preflight { .. })
        ));
        assert!(!tmp.path().join("env_prod_app.tfstate").exists());
    }

    #[test]
    fn successful_run_writes_backend_file_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = InitConfig {
            aws_bin: "true".into(),
            terraform_bin: "true".into(),
            ..InitConfig::default()
        };

        let dir = run(&in_tmp(tmp.path()), &cfg).unwrap();
        assert_eq!(dir, tmp.path().join("env_prod_app.tfstate"));
        let text = fs::read_to_string(dir.join("backend.tf")).unwrap();
        assert!(text.contains("bucket = \"demo-bucket\""));
        assert!(text.contains("key = \"env/prod/app.tfstate\""));
        assert!(text.contains("region = \"us-east-1\""));

        let again = run(&in_tmp(tmp.path()), &cfg).unwrap();
        assert_eq!(again, dir);
    }

    #[test]
    fn failed_terraform_init_leaves_files_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        // Stub: `version` succeeds, `init` fails.
        let stub = tmp.path().join("tf-stub.sh");
        fs::write(&stub, "#!/bin/sh\n[ \"$1\" = version ] && exit 0\nexit 1\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let cfg = InitConfig {
            aws_bin: "true".into(),
            terraform_bin: stub.to_string_lossy().into_owned(),
            ..InitConfig::default()
        };

        let err = run(&in_tmp(tmp.path()), &cfg).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::Operation(_))
        ));
        assert!(tmp.path().join("env_prod_app.tfstate").join("backend.tf").exists());
    }
}
