//! Log sources: where raw commit blocks come from.
//!
//! The retrieval layers only see the [`LogSource`] trait. [`GitLog`] shells
//! out to `git`; [`MemoryLog`] serves fixed blocks for tests and replays.

use std::path::{Path, PathBuf};
use std::process::Command;

use trailhead_core::parse::{self, GIT_LOG_FORMAT};
use trailhead_core::StructuredCommit;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// git is missing, the directory is not a repository, or the repository
    /// has no commits. Callers on the hot path treat this as "no data".
    #[error("log unavailable: {0}")]
    Unavailable(String),
    #[error("log read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Optional narrowing applied by the log reader itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Only records whose message matches this fixed string.
    pub grep: Option<String>,
}

impl LogFilter {
    pub fn grep(pattern: impl Into<String>) -> Self {
        Self {
            grep: Some(pattern.into()),
        }
    }
}

/// A line-oriented log reader yielding raw blocks, newest first.
pub trait LogSource {
    /// Hash of the current tip, or `None` when it cannot be determined.
    fn head(&self) -> Option<String>;

    /// Up to `max_count` raw blocks (all when `None`).
    fn read_blocks(&self, max_count: Option<usize>, filter: &LogFilter)
        -> Result<Vec<String>, LogError>;
}

/// Parsed result of one log traversal.
#[derive(Debug, Clone, Default)]
pub struct LogRead {
    pub commits: Vec<StructuredCommit>,
    /// Blocks that failed to decode and were skipped.
    pub dropped: usize,
}

/// Read and decode blocks. Malformed blocks are dropped with a diagnostic;
/// the rest of the batch is kept.
pub fn read_commits(
    source: &dyn LogSource,
    max_count: Option<usize>,
    filter: &LogFilter,
) -> Result<LogRead, LogError> {
    let blocks = source.read_blocks(max_count, filter)?;
    let mut out = LogRead::default();
    for block in &blocks {
        match parse::parse_record(block) {
            Ok(rec) => {
                for w in &rec.warnings {
                    tracing::warn!(commit = %rec.commit.short_hash(), "{w}");
                }
                out.commits.push(rec.commit);
            }
            Err(e) => {
                tracing::warn!("dropping log record: {e}");
                out.dropped += 1;
            }
        }
    }
    Ok(out)
}

/// Like [`read_commits`] but an unavailable log is just an empty result.
pub fn read_commits_or_empty(
    source: &dyn LogSource,
    max_count: Option<usize>,
    filter: &LogFilter,
) -> Vec<StructuredCommit> {
    match read_commits(source, max_count, filter) {
        Ok(read) => read.commits,
        Err(e) => {
            tracing::debug!("log read skipped: {e}");
            Vec::new()
        }
    }
}

// ── git ──

/// `git log` in a repository working tree.
#[derive(Debug, Clone)]
pub struct GitLog {
    repo_root: PathBuf,
    git_bin: String,
}

impl GitLog {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            git_bin: "git".to_string(),
        }
    }

    /// Use a different git executable (absolute path or name on PATH).
    pub fn with_git_bin(mut self, bin: impl Into<String>) -> Self {
        self.git_bin = bin.into();
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Resolve the top-level directory of the repository containing `dir`.
    pub fn discover_root(dir: &Path) -> Option<PathBuf> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let top = String::from_utf8(output.stdout).ok()?;
        let top = top.trim();
        (!top.is_empty()).then(|| PathBuf::from(top))
    }

    fn run(&self, args: &[String]) -> Result<String, LogError> {
        let output = Command::new(&self.git_bin)
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    LogError::Unavailable(format!("{} not found", self.git_bin))
                }
                _ => LogError::Io(e),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LogError::Unavailable(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl LogSource for GitLog {
    fn head(&self) -> Option<String> {
        let out = self
            .run(&["rev-parse".to_string(), "HEAD".to_string()])
            .ok()?;
        let head = out.trim();
        (!head.is_empty()).then(|| head.to_string())
    }

    fn read_blocks(
        &self,
        max_count: Option<usize>,
        filter: &LogFilter,
    ) -> Result<Vec<String>, LogError> {
        let mut args = vec!["log".to_string(), format!("--format={GIT_LOG_FORMAT}")];
        if let Some(n) = max_count {
            args.push(format!("--max-count={n}"));
        }
        if let Some(pattern) = filter.grep.as_deref().filter(|p| !p.is_empty()) {
            args.push("--fixed-strings".to_string());
            args.push(format!("--grep={pattern}"));
        }
        let raw = self.run(&args)?;
        Ok(parse::split_blocks(&raw).map(str::to_string).collect())
    }
}

// ── in-memory ──

/// Fixed, newest-first list of blocks with an explicit tip.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    head: Option<String>,
    blocks: Vec<String>,
}

impl MemoryLog {
    pub fn new(blocks: Vec<String>) -> Self {
        let head = blocks
            .first()
            .and_then(|b| b.split(parse::FIELD_SEP).next())
            .map(|h| h.trim().to_string());
        Self { head, blocks }
    }

    /// A log whose reads fail as if git were missing.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_head(mut self, head: impl Into<String>) -> Self {
        self.head = Some(head.into());
        self
    }

    /// Format one block in the git log layout.
    pub fn block(hash: &str, date: &str, message: &str) -> String {
        format!("{hash}{}{date}{}{message}", parse::FIELD_SEP, parse::FIELD_SEP)
    }
}

impl LogSource for MemoryLog {
    fn head(&self) -> Option<String> {
        self.head.clone()
    }

    fn read_blocks(
        &self,
        max_count: Option<usize>,
        filter: &LogFilter,
    ) -> Result<Vec<String>, LogError> {
        if self.head.is_none() {
            return Err(LogError::Unavailable("empty log".into()));
        }
        let grep = filter.grep.as_deref().filter(|p| !p.is_empty());
        Ok(self
            .blocks
            .iter()
            .filter(|b| grep.is_none_or(|g| b.contains(g)))
            .take(max_count.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryLog {
        MemoryLog::new(vec![
            MemoryLog::block(
                "cccccccc",
                "2025-01-03T00:00:00Z",
                "feat: three\n\nDecided-Against: kafka (ops cost)",
            ),
            MemoryLog::block("zzzz", "2025-01-02T00:00:00Z", "bad hash"),
            MemoryLog::block("aaaaaaaa", "2025-01-01T00:00:00Z", "fix: one"),
        ])
    }

    #[test]
    fn memory_log_head_is_first_block() {
        assert_eq!(sample().head().as_deref(), Some("cccccccc"));
    }

    #[test]
    fn read_commits_drops_malformed() {
        let read = read_commits(&sample(), None, &LogFilter::default()).unwrap();
        assert_eq!(read.commits.len(), 2);
        assert_eq!(read.dropped, 1);
        assert_eq!(read.commits[0].hash, "cccccccc");
    }

    #[test]
    fn max_count_and_grep() {
        let read = read_commits(&sample(), Some(1), &LogFilter::default()).unwrap();
        assert_eq!(read.commits.len(), 1);
        let read = read_commits(&sample(), None, &LogFilter::grep("Decided-Against")).unwrap();
        assert_eq!(read.commits.len(), 1);
        assert_eq!(read.commits[0].decided_against, vec!["kafka (ops cost)"]);
    }

    #[test]
    fn unavailable_log_reads_as_empty() {
        let log = MemoryLog::unavailable();
        assert!(log.head().is_none());
        assert!(matches!(
            read_commits(&log, None, &LogFilter::default()),
            Err(LogError::Unavailable(_))
        ));
        assert!(read_commits_or_empty(&log, None, &LogFilter::default()).is_empty());
    }

    #[test]
    fn missing_git_binary_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let log = GitLog::new(tmp.path()).with_git_bin("trailhead-no-such-git-binary");
        assert!(log.head().is_none());
        assert!(matches!(
            log.read_blocks(None, &LogFilter::default()),
            Err(LogError::Unavailable(_))
        ));
    }

    #[test]
    fn git_log_reads_real_repository() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let git = |args: &[&str]| {
            Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .unwrap()
        };
        git(&["init", "-q"]);
        git(&["config", "user.email", "test@test.com"]);
        git(&["config", "user.name", "Test"]);
        git(&["config", "commit.gpgsign", "false"]);
        git(&[
            "commit",
            "-q",
            "--allow-empty",
            "-m",
            "feat(auth): add login\n\nIntent: enable-capability\nScope: auth/login",
        ]);

        let log = GitLog::new(dir);
        let head = log.head().expect("head after first commit");
        let read = read_commits(&log, None, &LogFilter::default()).unwrap();
        assert_eq!(read.commits.len(), 1);
        assert_eq!(read.commits[0].hash, head);
        assert_eq!(read.commits[0].scope, vec!["auth/login"]);
        assert_eq!(
            read.commits[0].intent,
            Some(trailhead_core::Intent::EnableCapability)
        );
    }

    #[test]
    fn not_a_repository_is_unavailable() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let log = GitLog::new(tmp.path());
        assert!(log.head().is_none());
        assert!(matches!(
            log.read_blocks(Some(5), &LogFilter::default()),
            Err(LogError::Unavailable(_))
        ));
    }
}
