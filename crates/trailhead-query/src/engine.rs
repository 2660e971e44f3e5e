use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trailhead_core::{CommitSummary, QueryParams, StructuredCommit};
use trailhead_index::{sort_newest_first, TrailerIndex};
use trailhead_log::{read_commits_or_empty, LogFilter, LogSource};
use trailhead_store::ConfigMap;

use crate::filters::{apply_predicates, query_index_for_hashes};

/// What to do when the index path finds nothing for a filtered query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanFallback {
    /// Scan only when a decided-against keyword is active.
    #[default]
    DecidedAgainst,
    Always,
    Never,
}

impl ScanFallback {
    pub const CONFIG_KEY: &'static str = "query.scan_fallback";
    pub const ENV: &'static str = "TRAILHEAD_SCAN_FALLBACK";

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanFallback::DecidedAgainst => "decided-against",
            ScanFallback::Always => "always",
            ScanFallback::Never => "never",
        }
    }

    pub fn from_config(cfg: &ConfigMap) -> Self {
        match cfg.string_knob(Self::CONFIG_KEY, Self::ENV) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unknown {}, using default", Self::CONFIG_KEY);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    fn allows(&self, params: &QueryParams) -> bool {
        match self {
            ScanFallback::DecidedAgainst => params.decided_against_filter().is_some(),
            ScanFallback::Always => true,
            ScanFallback::Never => false,
        }
    }
}

impl FromStr for ScanFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "decided-against" => Ok(ScanFallback::DecidedAgainst),
            "always" => Ok(ScanFallback::Always),
            "never" => Ok(ScanFallback::Never),
            other => Err(format!("unknown scan fallback: {other}")),
        }
    }
}

impl fmt::Display for ScanFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves [`QueryParams`] against a fresh index when one is supplied,
/// otherwise against a full log scan. The scan runs at most once per engine.
pub struct QueryEngine<'a> {
    source: &'a dyn LogSource,
    index: Option<&'a TrailerIndex>,
    fallback: ScanFallback,
    scan_limit: Option<usize>,
    scanned: OnceCell<Vec<StructuredCommit>>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(source: &'a dyn LogSource) -> Self {
        Self {
            source,
            index: None,
            fallback: ScanFallback::default(),
            scan_limit: None,
            scanned: OnceCell::new(),
        }
    }

    /// Use `index` for resolution. The caller is responsible for only
    /// passing an index that loaded as fresh.
    pub fn with_index(mut self, index: Option<&'a TrailerIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_fallback(mut self, fallback: ScanFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Bound the log scan to the most recent `limit` records.
    pub fn with_scan_limit(mut self, limit: Option<usize>) -> Self {
        self.scan_limit = limit;
        self
    }

    pub fn index(&self) -> Option<&'a TrailerIndex> {
        self.index
    }

    /// Matching commits, newest first, at most `params.limit`.
    ///
    /// With an index the log is never read: a fresh index holds a summary
    /// of every commit, so the fallback scans those summaries instead.
    pub fn query(&self, params: &QueryParams) -> Vec<CommitSummary> {
        let Some(index) = self.index else {
            return self.query_scan(params);
        };
        if !params.is_filtered() {
            return index.recent(params.limit.max(1));
        }
        let hits = query_index(index, params);
        if hits.is_empty() && self.fallback.allows(params) {
            tracing::debug!(policy = %self.fallback, "index path empty, scanning summaries");
            return scan_summaries(index, params);
        }
        hits
    }

    /// Log scan path only, regardless of any index.
    pub fn query_scan(&self, params: &QueryParams) -> Vec<CommitSummary> {
        let matched = apply_predicates(self.scan_commits().iter().collect::<Vec<_>>(), params);
        let mut out: Vec<CommitSummary> = matched.into_iter().map(|c| c.summary()).collect();
        sort_newest_first(&mut out);
        out.truncate(params.limit.max(1));
        out
    }

    /// Records from the (possibly bounded) log scan. Read on first use.
    pub fn scan_commits(&self) -> &[StructuredCommit] {
        self.scanned.get_or_init(|| {
            let commits = read_commits_or_empty(self.source, self.scan_limit, &LogFilter::default());
            tracing::debug!(commits = commits.len(), "log scanned");
            commits
        })
    }

    /// Every distinct scope known to the index, or to the scan without one.
    pub fn known_scopes(&self) -> Vec<String> {
        match self.index {
            Some(index) => index.known_scopes().map(str::to_string).collect(),
            None => self
                .scan_commits()
                .iter()
                .flat_map(|c| c.scope.iter().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }
}

/// Index path: candidate hashes, then the precise filter chain again over
/// the summaries, newest first, limited.
pub fn query_index(index: &TrailerIndex, params: &QueryParams) -> Vec<CommitSummary> {
    let hashes = query_index_for_hashes(index, params);
    if hashes.is_empty() {
        return Vec::new();
    }
    let candidates: Vec<&CommitSummary> = index
        .log_order
        .iter()
        .filter(|h| hashes.contains(*h))
        .filter_map(|h| index.summary(h))
        .collect();
    let mut out: Vec<CommitSummary> = apply_predicates(candidates, params)
        .into_iter()
        .cloned()
        .collect();
    sort_newest_first(&mut out);
    out.truncate(params.limit.max(1));
    out
}

/// Every summary in the index through the full filter chain, bypassing
/// the inverted maps.
pub fn scan_summaries(index: &TrailerIndex, params: &QueryParams) -> Vec<CommitSummary> {
    let mut out: Vec<CommitSummary> = apply_predicates(index.summaries().collect(), params)
        .into_iter()
        .cloned()
        .collect();
    sort_newest_first(&mut out);
    out.truncate(params.limit.max(1));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use trailhead_core::Intent;
    use trailhead_log::{read_commits, LogError, MemoryLog};

    fn log(entries: &[(&str, &str, &str)]) -> MemoryLog {
        MemoryLog::new(
            entries
                .iter()
                .map(|(h, d, m)| MemoryLog::block(h, d, m))
                .collect(),
        )
    }

    fn index_of(source: &MemoryLog) -> TrailerIndex {
        let read = read_commits(source, None, &LogFilter::default()).unwrap();
        trailhead_index::build_from_commits(
            &source.head().unwrap(),
            &read.commits,
            "2025-03-01T00:00:00Z",
        )
    }

    fn auth_log() -> MemoryLog {
        log(&[
            (
                "cccc0003",
                "2025-01-03T00:00:00Z",
                "feat: sso\n\nIntent: enable-capability\nScope: authentication",
            ),
            (
                "bbbb0002",
                "2025-01-02T00:00:00Z",
                "feat: provider\n\nIntent: enable-capability\nScope: oauth/provider",
            ),
            (
                "aaaa0001",
                "2025-01-01T00:00:00Z",
                "feat: signup\n\nIntent: enable-capability\nScope: auth/registration",
            ),
        ])
    }

    fn redis_log() -> MemoryLog {
        log(&[
            (
                "eeee0005",
                "2025-02-05T00:00:00Z",
                "fix(cache): pool size\n\nIntent: fix-defect\nScope: cache\n\
                 Decided-Against: predis PHP client (wrong ecosystem)",
            ),
            (
                "dddd0004",
                "2025-02-04T00:00:00Z",
                "feat(events): fanout\n\nIntent: enable-capability\nScope: events/fanout\n\
                 Decided-Against: Redis pub/sub (no persistence)",
            ),
            (
                "cccc0003",
                "2025-02-03T00:00:00Z",
                "refactor(events): split bus\n\nIntent: restructure\nScope: events",
            ),
            (
                "bbbb0002",
                "2025-02-02T00:00:00Z",
                "docs: readme\n\nIntent: document\nSession: 2025-02-02/docs",
            ),
            (
                "aaaa0001",
                "2025-02-01T00:00:00Z",
                "fix(events): retry\n\nIntent: fix-defect\nScope: events/retry\n\
                 Decided-Against: jedis, redistribution of load",
            ),
        ])
    }

    fn hashes(results: &[CommitSummary]) -> Vec<&str> {
        results.iter().map(|c| c.hash.as_str()).collect()
    }

    #[test]
    fn auth_scope_excludes_lookalikes() {
        let source = auth_log();
        let index = index_of(&source);
        let params = QueryParams {
            scope: Some("auth".into()),
            ..QueryParams::default()
        };
        let scan = QueryEngine::new(&source).query(&params);
        let indexed = QueryEngine::new(&source).with_index(Some(&index)).query(&params);
        assert_eq!(hashes(&scan), vec!["aaaa0001"]);
        assert_eq!(hashes(&indexed), vec!["aaaa0001"]);
    }

    #[test]
    fn redis_keyword_is_whole_word() {
        let source = redis_log();
        let index = index_of(&source);
        let params = QueryParams {
            decided_against: Some("redis".into()),
            ..QueryParams::default()
        };
        for engine in [
            QueryEngine::new(&source),
            QueryEngine::new(&source).with_index(Some(&index)),
        ] {
            let results = engine.query(&params);
            assert_eq!(hashes(&results), vec!["dddd0004"]);
            assert_eq!(results[0].decided_against, vec!["Redis pub/sub (no persistence)"]);
        }
    }

    #[test]
    fn intent_union_newest_first() {
        let source = redis_log();
        let params = QueryParams {
            intents: vec![Intent::Document, Intent::Restructure],
            ..QueryParams::default()
        };
        let results = QueryEngine::new(&source).query(&params);
        assert_eq!(hashes(&results), vec!["cccc0003", "bbbb0002"]);
    }

    #[test]
    fn index_and_scan_agree_without_decided_against() {
        let source = redis_log();
        let index = index_of(&source);
        let cases = vec![
            QueryParams {
                intents: vec![Intent::FixDefect],
                ..QueryParams::default()
            },
            QueryParams {
                scope: Some("events".into()),
                ..QueryParams::default()
            },
            QueryParams {
                scope: Some("events".into()),
                intents: vec![Intent::FixDefect, Intent::Restructure],
                ..QueryParams::default()
            },
            QueryParams {
                session: Some("2025-02-02/docs".into()),
                ..QueryParams::default()
            },
            QueryParams {
                decisions_only: true,
                ..QueryParams::default()
            },
            QueryParams::default().with_limit(2),
            QueryParams {
                scope: Some("nothing/here".into()),
                ..QueryParams::default()
            },
        ];
        let scan = QueryEngine::new(&source);
        let indexed = QueryEngine::new(&source)
            .with_index(Some(&index))
            .with_fallback(ScanFallback::Never);
        for params in &cases {
            assert_eq!(scan.query(params), indexed.query(params), "{params:?}");
        }
    }

    #[test]
    fn unfiltered_returns_most_recent() {
        let source = redis_log();
        let results = QueryEngine::new(&source).query(&QueryParams::default().with_limit(3));
        assert_eq!(hashes(&results), vec!["eeee0005", "dddd0004", "cccc0003"]);
    }

    #[test]
    fn scan_fallback_policy() {
        let source = redis_log();
        // Inverted maps that lost entries: only the summaries still know
        // about the decided-against commits and the docs commit.
        let mut index = index_of(&source);
        index.with_decided_against.clear();
        index.by_intent.remove("document");

        let keyword = QueryParams {
            decided_against: Some("redis".into()),
            ..QueryParams::default()
        };
        let by_intent = QueryParams {
            intents: vec![Intent::Document],
            ..QueryParams::default()
        };

        let default = QueryEngine::new(&source).with_index(Some(&index));
        assert_eq!(hashes(&default.query(&keyword)), vec!["dddd0004"]);
        assert!(default.query(&by_intent).is_empty());

        let never = QueryEngine::new(&source)
            .with_index(Some(&index))
            .with_fallback(ScanFallback::Never);
        assert!(never.query(&keyword).is_empty());

        let always = QueryEngine::new(&source)
            .with_index(Some(&index))
            .with_fallback(ScanFallback::Always);
        assert_eq!(hashes(&always.query(&by_intent)), vec!["bbbb0002"]);
    }

    /// Counts reads so tests can assert the log was never touched.
    struct CountingLog {
        inner: MemoryLog,
        reads: Cell<usize>,
    }

    impl LogSource for CountingLog {
        fn head(&self) -> Option<String> {
            self.inner.head()
        }

        fn read_blocks(
            &self,
            max_count: Option<usize>,
            filter: &LogFilter,
        ) -> Result<Vec<String>, LogError> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read_blocks(max_count, filter)
        }
    }

    #[test]
    fn fresh_index_never_reads_log() {
        let source = CountingLog {
            inner: redis_log(),
            reads: Cell::new(0),
        };
        let index = index_of(&source.inner);
        let engine = QueryEngine::new(&source)
            .with_index(Some(&index))
            .with_fallback(ScanFallback::Always);

        let missing_keyword = QueryParams {
            decided_against: Some("kafka".into()),
            ..QueryParams::default()
        };
        let missing_scope = QueryParams {
            scope: Some("billing".into()),
            ..QueryParams::default()
        };
        assert!(engine.query(&missing_keyword).is_empty());
        assert!(engine.query(&missing_scope).is_empty());
        assert_eq!(hashes(&engine.query(&QueryParams::default().with_limit(1))), vec!["eeee0005"]);
        assert_eq!(engine.known_scopes().len(), 4);
        assert_eq!(source.reads.get(), 0);
    }

    #[test]
    fn index_and_scan_agree_on_rebased_history() {
        // Log order disagrees with author dates.
        let source = log(&[
            ("cccc0003", "2025-01-01T00:00:00Z", "fix: a\n\nIntent: fix-defect\nScope: api"),
            ("bbbb0002", "2025-03-01T00:00:00Z", "fix: b\n\nIntent: fix-defect\nScope: api"),
            ("aaaa0001", "2025-04-01T00:00:00Z", "feat: c\n\nIntent: explore\nScope: ui"),
        ]);
        let index = index_of(&source);
        let scan = QueryEngine::new(&source);
        let indexed = QueryEngine::new(&source).with_index(Some(&index));
        for params in [
            QueryParams::default().with_limit(1),
            QueryParams::default().with_limit(2),
            QueryParams {
                scope: Some("api".into()),
                limit: 1,
                ..QueryParams::default()
            },
        ] {
            assert_eq!(scan.query(&params), indexed.query(&params), "{params:?}");
        }
        assert_eq!(hashes(&indexed.query(&QueryParams::default().with_limit(1))), vec!["aaaa0001"]);
    }

    #[test]
    fn unavailable_log_yields_nothing() {
        let source = MemoryLog::unavailable();
        let engine = QueryEngine::new(&source);
        assert!(engine.query(&QueryParams::default()).is_empty());
        assert!(engine.known_scopes().is_empty());
    }

    #[test]
    fn known_scopes_from_scan() {
        let source = redis_log();
        let scopes = QueryEngine::new(&source).known_scopes();
        assert_eq!(scopes, vec!["cache", "events", "events/fanout", "events/retry"]);
    }

    #[test]
    fn scan_limit_bounds_read() {
        let source = redis_log();
        let engine = QueryEngine::new(&source).with_scan_limit(Some(2));
        assert_eq!(engine.scan_commits().len(), 2);
    }

    #[test]
    fn fallback_parses_from_config() {
        let mut cfg = ConfigMap::default();
        assert_eq!(ScanFallback::from_config(&cfg), ScanFallback::DecidedAgainst);
        cfg.set(ScanFallback::CONFIG_KEY, "always");
        assert_eq!(ScanFallback::from_config(&cfg), ScanFallback::Always);
        cfg.set(ScanFallback::CONFIG_KEY, "sometimes");
        assert_eq!(ScanFallback::from_config(&cfg), ScanFallback::DecidedAgainst);
        assert_eq!(
            "decided_against".parse::<ScanFallback>(),
            Ok(ScanFallback::DecidedAgainst)
        );
    }
}
