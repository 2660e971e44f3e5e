//! Inverted index over commit trailers.
//!
//! The index is a single JSON file stamped with the log tip it was built
//! from. It is only trusted while that stamp equals the current tip; any
//! other state (missing, corrupt, unknown version, stale) reads as "no
//! index" and callers fall back to scanning the log.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use trailhead_core::{CommitHash, CommitSummary, Intent, StructuredCommit, TrailerView};
use trailhead_log::{read_commits, LogError, LogFilter, LogSource};
use trailhead_store::StorePaths;

/// Bump when the on-disk shape changes. Files with any other version are
/// ignored, never migrated.
pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("log tip could not be determined")]
    NoHead,
    #[error("index I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("index encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("index store: {0}")]
    Store(#[from] anyhow::Error),
}

// ── TrailerIndex ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailerIndex {
    pub version: u32,
    pub generated: String,
    pub head_commit: CommitHash,
    pub commit_count: usize,
    #[serde(default)]
    pub by_intent: BTreeMap<String, Vec<CommitHash>>,
    #[serde(default)]
    pub by_scope: BTreeMap<String, Vec<CommitHash>>,
    #[serde(default)]
    pub by_session: BTreeMap<String, Vec<CommitHash>>,
    #[serde(default)]
    pub with_decided_against: Vec<CommitHash>,
    #[serde(default)]
    pub commits: BTreeMap<CommitHash, CommitSummary>,
    /// Hashes in log order, newest first.
    #[serde(default)]
    pub log_order: Vec<CommitHash>,
}

impl TrailerIndex {
    pub fn summary(&self, hash: &str) -> Option<&CommitSummary> {
        self.commits.get(hash)
    }

    /// Summaries in log order.
    pub fn summaries(&self) -> impl Iterator<Item = &CommitSummary> {
        self.log_order.iter().filter_map(|h| self.commits.get(h))
    }

    /// Every scope key present in the index.
    pub fn known_scopes(&self) -> impl Iterator<Item = &str> {
        self.by_scope.keys().map(String::as_str)
    }

    pub fn intent_hashes(&self, intent: Intent) -> &[CommitHash] {
        self.by_intent
            .get(intent.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The `n` most recently dated commits, newest first. Log order is not
    /// date order after rebases, so every summary is ranked before cutting.
    pub fn recent(&self, n: usize) -> Vec<CommitSummary> {
        let mut out: Vec<CommitSummary> = self.summaries().cloned().collect();
        sort_newest_first(&mut out);
        out.truncate(n);
        out
    }

    /// The `n` most recently dated commits carrying decided-against entries.
    pub fn decided_against_recent(&self, n: usize) -> Vec<CommitSummary> {
        let mut out: Vec<CommitSummary> = self
            .with_decided_against
            .iter()
            .filter_map(|h| self.commits.get(h))
            .cloned()
            .collect();
        sort_newest_first(&mut out);
        out.truncate(n);
        out
    }
}

/// Build an index from already-parsed commits (newest first). Pure and
/// deterministic for identical input.
pub fn build_from_commits(
    head_commit: &str,
    commits: &[StructuredCommit],
    generated: &str,
) -> TrailerIndex {
    let mut index = TrailerIndex {
        version: INDEX_VERSION,
        generated: generated.to_string(),
        head_commit: head_commit.to_string(),
        commit_count: 0,
        by_intent: BTreeMap::new(),
        by_scope: BTreeMap::new(),
        by_session: BTreeMap::new(),
        with_decided_against: Vec::new(),
        commits: BTreeMap::new(),
        log_order: Vec::new(),
    };

    for commit in commits {
        if index.commits.contains_key(&commit.hash) {
            continue;
        }
        let hash = &commit.hash;
        if let Some(intent) = commit.intent {
            index
                .by_intent
                .entry(intent.as_str().to_string())
                .or_default()
                .push(hash.clone());
        }
        for scope in &commit.scope {
            let list = index.by_scope.entry(scope.clone()).or_default();
            if !list.contains(hash) {
                list.push(hash.clone());
            }
        }
        if let Some(session) = commit.session.as_deref() {
            index
                .by_session
                .entry(session.to_string())
                .or_default()
                .push(hash.clone());
        }
        if !commit.decided_against.is_empty() {
            index.with_decided_against.push(hash.clone());
        }
        index.log_order.push(hash.clone());
        index.commits.insert(hash.clone(), commit.summary());
    }

    index.commit_count = index.commits.len();
    index
}

/// Full traversal of `source`. Fails only when the log cannot be read.
pub fn build(source: &dyn LogSource) -> Result<TrailerIndex, IndexError> {
    // Stamp with the tip observed before the traversal so a concurrent
    // commit leaves the index stale rather than silently incomplete.
    let head = source.head();
    let read = read_commits(source, None, &LogFilter::default())?;
    let head = head.ok_or(IndexError::NoHead)?;
    if read.dropped > 0 {
        tracing::warn!(dropped = read.dropped, "malformed log records skipped while indexing");
    }
    Ok(build_from_commits(&head, &read.commits, &now_rfc3339()))
}

/// Durable write: temp file in the same directory, then rename.
pub fn write(index: &TrailerIndex, path: &Path) -> Result<(), IndexError> {
    let json = serde_json::to_vec(index)?;
    trailhead_store::write_atomic(path, &json)?;
    Ok(())
}

/// Rebuild wholesale under the store's exclusive rebuild lock.
pub fn rebuild(paths: &StorePaths, source: &dyn LogSource) -> Result<TrailerIndex, IndexError> {
    paths.ensure_dirs()?;
    let _guard = trailhead_store::lock_file(&paths.lock_file)?;
    let index = build(source)?;
    write(&index, &paths.index_json)?;
    tracing::debug!(
        commits = index.commit_count,
        head = %index.head_commit,
        "trailer index rebuilt"
    );
    Ok(index)
}

// ── Freshness ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Built from `indexed`; the tip is now `current` (unknown when `None`).
    Stale {
        indexed: CommitHash,
        current: Option<CommitHash>,
    },
    /// No usable file: missing, corrupt, or an unrecognized version.
    Absent,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale { .. } => "stale",
            Freshness::Absent => "absent",
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Just the fields needed to judge freshness.
#[derive(Deserialize)]
struct IndexHeader {
    version: u32,
    head_commit: CommitHash,
}

fn inspect(path: &Path, source: &dyn LogSource) -> (Freshness, Option<String>) {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), "cannot read trailer index: {e}");
            }
            return (Freshness::Absent, None);
        }
    };
    let header: IndexHeader = match serde_json::from_str(&raw) {
        Ok(h) => h,
        Err(e) => {
            tracing::debug!(path = %path.display(), "trailer index unreadable: {e}");
            return (Freshness::Absent, None);
        }
    };
    if header.version != INDEX_VERSION {
        tracing::debug!(version = header.version, "trailer index version not recognized");
        return (Freshness::Absent, None);
    }
    let current = source.head();
    if current.as_deref() == Some(header.head_commit.as_str()) {
        (Freshness::Fresh, Some(raw))
    } else {
        (
            Freshness::Stale {
                indexed: header.head_commit,
                current,
            },
            None,
        )
    }
}

pub fn check_freshness(path: &Path, source: &dyn LogSource) -> Freshness {
    inspect(path, source).0
}

/// The index at `path`, only if it is fresh. Never retries or rebuilds.
pub fn load(path: &Path, source: &dyn LogSource) -> Option<TrailerIndex> {
    let (freshness, raw) = inspect(path, source);
    if !freshness.is_fresh() {
        tracing::debug!(state = freshness.as_str(), "trailer index not used");
        return None;
    }
    match serde_json::from_str(&raw?) {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::warn!(path = %path.display(), "trailer index body invalid: {e}");
            None
        }
    }
}

// ── Date ordering ──

pub fn parse_date(date: &str) -> Option<time::OffsetDateTime> {
    time::OffsetDateTime::parse(date.trim(), &time::format_description::well_known::Rfc3339).ok()
}

/// Newer first. Parseable RFC 3339 dates rank before unparseable ones;
/// unparseable dates order among themselves by reverse string comparison.
/// This is a total order, so it is safe for `sort_by`.
pub fn compare_newest_first(a: &str, b: &str) -> Ordering {
    match (parse_date(a), parse_date(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

/// Stable sort by date, newest first; equal dates keep their input order.
pub fn sort_newest_first<T: TrailerView>(items: &mut [T]) {
    items.sort_by(|a, b| compare_newest_first(a.date(), b.date()));
}

pub(crate) fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}
