//! Line-oriented discovery of `backend "s3"` blocks in `.tf` files.
//!
//! This is pattern matching, not HCL parsing.  [`BlockScanner`] is a two-state
//! machine fed one line at a time:
//!
//! ```text
//!            backend "s3" marker
//!   Idle ───────────────────────────▶ InBlock ──┐ bucket/key/region
//!    ▲                                  │  ▲────┘ (first occurrence kept)
//!    └──────── line is only "}" ────────┘
//!                (emit record)
//! ```
//!
//! A block still open at end of file is dropped.  Scanner state never carries
//! over from one file to the next.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use walkdir::WalkDir;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*backend\s+"s3""#).expect("marker regex"));

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(bucket|key|region)\s*=\s*"([^"]*)""#).expect("field regex")
});

/// The three fields captured from one backend block.  Missing fields are
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendFields {
    pub bucket: String,
    pub key: String,
    pub region: String,
}

/// One discovered backend block and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRecord {
    pub source_file: PathBuf,
    pub bucket: String,
    pub key: String,
    pub region: String,
}

impl BackendRecord {
    fn new(source_file: &Path, f: BackendFields) -> Self {
        Self {
            source_file: source_file.to_path_buf(),
            bucket: f.bucket,
            key: f.key,
            region: f.region,
        }
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    InBlock {
        bucket: Option<String>,
        key: Option<String>,
        region: Option<String>,
    },
}

#[derive(Debug, Default)]
pub struct BlockScanner {
    state: State,
}

impl BlockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_block(&self) -> bool {
        matches!(self.state, State::InBlock { .. })
    }

    /// Advance by one line.  Returns the finished block when `line` closes
    /// one.
    pub fn feed(&mut self, line: &str) -> Option<BackendFields> {
        match self.state {
            State::Idle => {
                if MARKER.is_match(line) {
                    self.state = State::InBlock {
                        bucket: None,
                        key: None,
                        region: None,
                    };
                }
                None
            },
            State::InBlock {
                ref mut bucket,
                ref mut key,
                ref mut region,
            } => {
                if line.trim() == "}" {
                    let done = BackendFields {
                        bucket: bucket.take().unwrap_or_default(),
                        key: key.take().unwrap_or_default(),
                        region: region.take().unwrap_or_default(),
                    };
                    self.state = State::Idle;
                    return Some(done);
                }
                if let Some(caps) = FIELD.captures(line) {
                    let slot = match &caps[1] {
                        "bucket" => bucket,
                        "key" => key,
                        _ => region,
                    };
                    if slot.is_none() {
                        *slot = Some(caps[2].to_string());
                    }
                }
                None
            },
        }
    }
}

/// Run a fresh scanner over `lines`, collecting every closed block.
pub fn scan_lines<I, S>(lines: I) -> Vec<BackendFields>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scanner = BlockScanner::new();
    let found: Vec<BackendFields> = lines
        .into_iter()
        .filter_map(|l| scanner.feed(l.as_ref()))
        .collect();
    if scanner.in_block() {
        tracing::warn!("backend \"s3\" block not closed before end of input; dropped");
    }
    found
}

/// Scan one file.  Invalid UTF-8 is replaced rather than rejected.
pub fn scan_file(path: &Path) -> std::io::Result<Vec<BackendRecord>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    tracing::debug!(file = %path.display(), "scanning");
    Ok(scan_lines(text.lines())
        .into_iter()
        .map(|f| BackendRecord::new(path, f))
        .collect())
}

/// Walk `root` in file-name order and scan every `*.tf` file.
///
/// Directories whose name appears in `exclude_dirs` are skipped (the root
/// itself never is).  Unreadable entries are logged and skipped.
pub fn scan_tree(root: &Path, exclude_dirs: &[String]) -> Vec<BackendRecord> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && exclude_dirs
                    .iter()
                    .any(|x| e.file_name().to_string_lossy() == x.as_str()))
        });

    let mut records = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            },
        };
        if !entry.file_type().is_file() || !is_tf(entry.path()) {
            continue;
        }
        match scan_file(entry.path()) {
            Ok(found) => records.extend(found),
            Err(e) => tracing::warn!(file = %entry.path().display(), error = %e, "skipping file"),
        }
    }
    records
}

fn is_tf(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tf")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
