//! Terminal UI — spinners, stage lines, captured command output, tables.
//!
//! # Design goals
//!
//! - **Clean by default.** While a stage is running the user sees only a spinner and a short label.
//!   Raw aws/terraform output is captured and hidden.
//! - **Informative on failure.** If a stage exits non-zero its captured stdout *and* stderr are
//!   printed in full so the operator can diagnose the problem without re-running manually.
//! - **Testable without a terminal.** [`StageOutcome`] is plain data and the table renderer
//!   returns a `String`.

use std::{
    path::Path,
    process::{Command, Output, Stdio},
    time::Duration,
};

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::{Table, Tabled, settings::Style};

use crate::{runner::Invocation, scanner::BackendRecord};

// ─── Icons ───────────────────────────────────────────────────────────────────

static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Stage result ─────────────────────────────────────────────────────────────

/// The outcome of a single stage.
///
/// Carries the stage label plus whatever the command wrote to stdout/stderr so
/// it can be replayed to the terminal when something goes wrong.
#[derive(Debug)]
pub struct StageOutcome {
    /// Human-readable stage label, e.g. `"Identity check"`.
    pub label: String,
    pub success: bool,
    /// Short note shown next to a successful stage, e.g. the resolved path.
    pub detail: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn ok(label: &str, detail: Option<String>) -> Self {
        Self {
            label: label.to_string(),
            success: true,
            detail,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        }
    }

    pub fn err(label: &str, error: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            success: false,
            detail: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
        }
    }

    /// Print the one-line summary (✓/✗ + label) to stdout.
    ///
    /// On failure, also prints the captured stdout/stderr and the error
    /// message so the operator has everything they need without re-running.
    pub fn print(&self) {
        if self.success {
            match self.detail {
                Some(ref d) => println!(
                    "  {}  {}  {}",
                    icon_ok(),
                    style(&self.label).bold(),
                    style(d).dim()
                ),
                None => println!("  {}  {}", icon_ok(), style(&self.label).bold()),
            }
            return;
        }

        println!("  {}  {}", icon_err(), style(&self.label).bold());

        if let Some(ref msg) = self.error {
            eprintln!();
            eprintln!("  {} {}", style("Error:").red().bold(), msg);
        }
        if !self.stdout.is_empty() {
            eprintln!();
            eprintln!("  {} stdout:", style("►").dim());
            for line in self.stdout.lines() {
                eprintln!("    {line}");
            }
        }
        if !self.stderr.is_empty() {
            eprintln!();
            eprintln!("  {} stderr:", style("►").dim());
            for line in self.stderr.lines() {
                eprintln!("    {line}");
            }
        }
    }

    pub const fn failed(&self) -> bool {
        !self.success
    }
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

/// Create and start an indeterminate spinner for `label`.
///
/// Hidden automatically when stdout is not a terminal.
fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(s) = ProgressStyle::with_template("  {spinner:.cyan}  {msg}") {
        pb.set_style(s.tick_chars(SPINNER_CHARS));
    }
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ─── Captured execution ───────────────────────────────────────────────────────

/// Run an invocation, capturing both stdout and stderr.
///
/// Returns `(success, stdout_text, stderr_text)`.
pub fn run_captured(inv: &Invocation) -> Result<(bool, String, String)> {
    let (prog, rest) = inv.argv.split_first().context("cannot run an empty command")?;

    let mut cmd = Command::new(prog);
    cmd.args(rest).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(ref dir) = inv.dir {
        cmd.current_dir(dir);
    }
    cmd.envs(inv.env.iter().map(|(k, v)| (k, v)));

    tracing::debug!(command = %inv.display(), dir = ?inv.dir, "spawning");
    let output: Output = cmd
        .output()
        .with_context(|| format!("failed to spawn: {}", inv.display()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    tracing::debug!(command = %inv.display(), status = %output.status, "finished");

    Ok((output.status.success(), stdout, stderr))
}

// ─── High-level stage runners ─────────────────────────────────────────────────

/// Run an external command behind a spinner, returning a [`StageOutcome`].
///
/// The spinner is cleared before the outcome line is printed, so the terminal
/// always shows a clean, static summary when the stage finishes.
pub fn run_stage(label: &str, inv: &Invocation) -> StageOutcome {
    let spinner = make_spinner(label);
    let result = run_captured(inv);
    spinner.finish_and_clear();

    match result {
        Ok((success, stdout, stderr)) => StageOutcome {
            label: label.to_string(),
            success,
            detail: None,
            stdout,
            stderr,
            error: (!success).then(|| format!("command exited non-zero: {}", inv.display())),
        },
        Err(e) => StageOutcome::err(label, format!("{e:#}")),
    }
}

/// Run an in-process step behind a spinner.
///
/// `f` returns the step's value plus an optional detail for the outcome line.
/// The value (or the error) is handed back next to the outcome.
pub fn task_stage<T, E, F>(label: &str, f: F) -> (StageOutcome, Result<T, E>)
where
    F: FnOnce() -> Result<(T, Option<String>), E>,
    E: std::fmt::Display,
{
    let spinner = make_spinner(label);
    let result = f();
    spinner.finish_and_clear();

    match result {
        Ok((value, detail)) => (StageOutcome::ok(label, detail), Ok(value)),
        Err(e) => (StageOutcome::err(label, e.to_string()), Err(e)),
    }
}

// ─── Summary banner ───────────────────────────────────────────────────────────

/// Print the final banner: `done` when every stage passed, otherwise
/// `failed` followed by the failing stage labels.
pub fn print_summary(outcomes: &[StageOutcome], done: &str, failed_title: &str) {
    let failed: Vec<&StageOutcome> = outcomes.iter().filter(|o| o.failed()).collect();
    println!();
    if failed.is_empty() {
        println!("  {} {}", icon_done(), style(done).cyan().bold());
    } else {
        eprintln!("  {}  {}", icon_err(), style(failed_title).red().bold());
        for o in &failed {
            eprintln!("    {} {}", icon_err(), style(&o.label).red());
        }
    }
    println!();
}

// ─── Backend table ────────────────────────────────────────────────────────────

pub const FILE_WIDTH: usize = 40;
pub const BUCKET_WIDTH: usize = 30;
pub const KEY_WIDTH: usize = 50;
pub const REGION_WIDTH: usize = 15;

const ELLIPSIS: &str = "...";

/// Shorten `value` to at most `max` characters, ending in `...` when cut.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = value.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "FILE")]
    file: String,
    #[tabled(rename = "BUCKET")]
    bucket: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "REGION")]
    region: String,
}

impl Row {
    fn from_record(root: &Path, r: &BackendRecord) -> Self {
        let file = r.source_file.strip_prefix(root).unwrap_or(&r.source_file);
        Self {
            file: truncate(&file.display().to_string(), FILE_WIDTH),
            bucket: truncate(&r.bucket, BUCKET_WIDTH),
            key: truncate(&r.key, KEY_WIDTH),
            region: truncate(&r.region, REGION_WIDTH),
        }
    }
}

/// Render the header plus one row per record, or the header plus a
/// "none found" line when `records` is empty.
pub fn render_backend_table(root: &Path, records: &[BackendRecord]) -> String {
    let rows: Vec<Row> = records.iter().map(|r| Row::from_record(root, r)).collect();
    let mut table = Table::new(rows);
    table.with(Style::blank());

    let mut out = table.to_string();
    out.push('\n');
    if records.is_empty() {
        out.push_str(&format!("No S3 backends found under {}\n", root.display()));
    }
    out
}

// ─── Tests ────────────────────────────────────────────────────────────────────
