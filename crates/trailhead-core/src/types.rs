use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Commit hash (full 40-char hex as emitted by `git log %H`).
pub type CommitHash = String;

// ── Intent ──

/// Strategic motivation of a commit, carried by the `Intent:` trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    EnableCapability,
    FixDefect,
    ImproveQuality,
    Restructure,
    ConfigureInfra,
    Document,
    Explore,
    ResolveBlocker,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::EnableCapability,
        Intent::FixDefect,
        Intent::ImproveQuality,
        Intent::Restructure,
        Intent::ConfigureInfra,
        Intent::Document,
        Intent::Explore,
        Intent::ResolveBlocker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::EnableCapability => "enable-capability",
            Intent::FixDefect => "fix-defect",
            Intent::ImproveQuality => "improve-quality",
            Intent::Restructure => "restructure",
            Intent::ConfigureInfra => "configure-infra",
            Intent::Document => "document",
            Intent::Explore => "explore",
            Intent::ResolveBlocker => "resolve-blocker",
        }
    }

    /// Parse a trailer value. Case-insensitive; `_` and ` ` are accepted
    /// in place of `-`. Returns `None` for anything outside the enumeration.
    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_lowercase().replace(['_', ' '], "-");
        Intent::ALL.into_iter().find(|i| i.as_str() == norm)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Classification ──

/// Conventional-commit type from the header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Feat,
    Fix,
    Refactor,
    Perf,
    Docs,
    Test,
    Build,
    Ci,
    Chore,
    Style,
    Revert,
    Other,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Feat => "feat",
            Classification::Fix => "fix",
            Classification::Refactor => "refactor",
            Classification::Perf => "perf",
            Classification::Docs => "docs",
            Classification::Test => "test",
            Classification::Build => "build",
            Classification::Ci => "ci",
            Classification::Chore => "chore",
            Classification::Style => "style",
            Classification::Revert => "revert",
            Classification::Other => "other",
        }
    }

    /// Map a header type token to a label. Unknown tokens return `None`
    /// so the caller can treat the whole header as free text.
    pub fn from_token(token: &str) -> Option<Self> {
        let c = match token.to_lowercase().as_str() {
            "feat" | "feature" => Classification::Feat,
            "fix" | "bugfix" => Classification::Fix,
            "refactor" => Classification::Refactor,
            "perf" => Classification::Perf,
            "docs" | "doc" => Classification::Docs,
            "test" | "tests" => Classification::Test,
            "build" => Classification::Build,
            "ci" => Classification::Ci,
            "chore" => Classification::Chore,
            "style" => Classification::Style,
            "revert" => Classification::Revert,
            _ => return None,
        };
        Some(c)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── StructuredCommit ──

/// One parsed log entry. Immutable once produced by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredCommit {
    pub hash: CommitHash,
    pub date: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_scope: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub decided_against: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default)]
    pub refs: Vec<String>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaking: Option<String>,
}

impl StructuredCommit {
    /// Project to the display fields stored in the index.
    pub fn summary(&self) -> CommitSummary {
        CommitSummary {
            hash: self.hash.clone(),
            date: self.date.clone(),
            subject: self.subject.clone(),
            intent: self.intent,
            scope: self.scope.clone(),
            session: self.session.clone(),
            decided_against: self.decided_against.clone(),
        }
    }

    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// Display projection of a commit. Excludes the body to bound index size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: CommitHash,
    pub date: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decided_against: Vec<String>,
}

impl CommitSummary {
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// First seven bytes of `hash`, or all of it when that would split a
/// character.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

// ── TrailerView ──

/// Read access to the trailer fields the query filters look at.
/// Implemented by full records and by index projections so one filter
/// chain serves both the scan path and the index path.
pub trait TrailerView {
    fn hash(&self) -> &str;
    fn date(&self) -> &str;
    fn intent(&self) -> Option<Intent>;
    fn scopes(&self) -> &[String];
    fn session(&self) -> Option<&str>;
    fn decided_against(&self) -> &[String];
}

impl TrailerView for StructuredCommit {
    fn hash(&self) -> &str {
        &self.hash
    }
    fn date(&self) -> &str {
        &self.date
    }
    fn intent(&self) -> Option<Intent> {
        self.intent
    }
    fn scopes(&self) -> &[String] {
        &self.scope
    }
    fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }
    fn decided_against(&self) -> &[String] {
        &self.decided_against
    }
}

impl TrailerView for CommitSummary {
    fn hash(&self) -> &str {
        &self.hash
    }
    fn date(&self) -> &str {
        &self.date
    }
    fn intent(&self) -> Option<Intent> {
        self.intent
    }
    fn scopes(&self) -> &[String] {
        &self.scope
    }
    fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }
    fn decided_against(&self) -> &[String] {
        &self.decided_against
    }
}

impl<T: TrailerView + ?Sized> TrailerView for &T {
    fn hash(&self) -> &str {
        (**self).hash()
    }
    fn date(&self) -> &str {
        (**self).date()
    }
    fn intent(&self) -> Option<Intent> {
        (**self).intent()
    }
    fn scopes(&self) -> &[String] {
        (**self).scopes()
    }
    fn session(&self) -> Option<&str> {
        (**self).session()
    }
    fn decided_against(&self) -> &[String] {
        (**self).decided_against()
    }
}

// ── QueryParams ──

pub const DEFAULT_QUERY_LIMIT: usize = 20;

/// Filter set for a query. Intents OR together; every other active
/// field ANDs with the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub decisions_only: bool,
    #[serde(default)]
    pub decided_against: Option<String>,
    pub limit: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            intents: Vec::new(),
            scope: None,
            session: None,
            decisions_only: false,
            decided_against: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl QueryParams {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Active scope pattern (`None` when unset or blank).
    pub fn scope_filter(&self) -> Option<&str> {
        non_blank(self.scope.as_deref())
    }

    pub fn session_filter(&self) -> Option<&str> {
        non_blank(self.session.as_deref())
    }

    pub fn decided_against_filter(&self) -> Option<&str> {
        non_blank(self.decided_against.as_deref())
    }

    /// True when at least one predicate filter is active.
    pub fn is_filtered(&self) -> bool {
        !self.intents.is_empty()
            || self.scope_filter().is_some()
            || self.session_filter().is_some()
            || self.decisions_only
            || self.decided_against_filter().is_some()
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ── Prompt signals / follow-ups ──

/// Signals extracted from one prompt. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSignals {
    #[serde(default)]
    pub scope_hints: Vec<String>,
    #[serde(default)]
    pub intent_hints: Vec<Intent>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl PromptSignals {
    pub fn is_empty(&self) -> bool {
        self.scope_hints.is_empty() && self.intent_hints.is_empty() && self.keywords.is_empty()
    }
}

/// One model-proposed refinement query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpQuery {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub decided_against: Option<String>,
}

impl FollowUpQuery {
    pub fn is_actionable(&self) -> bool {
        non_blank(self.scope.as_deref()).is_some()
            || self.intent.is_some()
            || non_blank(self.decided_against.as_deref()).is_some()
    }

    pub fn to_params(&self, limit: usize) -> QueryParams {
        QueryParams {
            intents: self.intent.into_iter().collect(),
            scope: non_blank(self.scope.as_deref()).map(str::to_string),
            session: None,
            decisions_only: false,
            decided_against: non_blank(self.decided_against.as_deref()).map(str::to_string),
            limit,
        }
    }
}

// ── ContextMode ──

/// Which pipeline stage produced a context block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextMode {
    ModelEnhanced,
    Heuristic,
    Recency,
}

impl ContextMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextMode::ModelEnhanced => "model-enhanced",
            ContextMode::Heuristic => "heuristic",
            ContextMode::Recency => "recency",
        }
    }
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parse_accepts_variants() {
        assert_eq!(Intent::parse("fix-defect"), Some(Intent::FixDefect));
        assert_eq!(Intent::parse("  Fix_Defect "), Some(Intent::FixDefect));
        assert_eq!(Intent::parse("resolve blocker"), Some(Intent::ResolveBlocker));
        assert_eq!(Intent::parse("bugfix"), None);
        assert_eq!(Intent::parse(""), None);
    }

    #[test]
    fn intent_round_trips_through_serde() {
        let json = serde_json::to_string(&Intent::ConfigureInfra).unwrap();
        assert_eq!(json, "\"configure-infra\"");
        let back: Intent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Intent::ConfigureInfra);
    }

    #[test]
    fn short_hash_never_splits_characters() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456");
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("ab\u{e9}\u{e9}\u{e9}\u{e9}"), "ab\u{e9}\u{e9}\u{e9}\u{e9}");
    }

    #[test]
    fn classification_tokens() {
        assert_eq!(Classification::from_token("FEAT"), Some(Classification::Feat));
        assert_eq!(Classification::from_token("docs"), Some(Classification::Docs));
        assert_eq!(Classification::from_token("wip"), None);
    }

    #[test]
    fn query_params_blank_fields_are_inactive() {
        let p = QueryParams {
            scope: Some("  ".into()),
            decided_against: Some(String::new()),
            ..Default::default()
        };
        assert!(!p.is_filtered());
        let p = QueryParams {
            decisions_only: true,
            ..Default::default()
        };
        assert!(p.is_filtered());
    }

    #[test]
    fn follow_up_needs_one_field() {
        assert!(!FollowUpQuery::default().is_actionable());
        let f = FollowUpQuery {
            scope: Some("auth".into()),
            ..Default::default()
        };
        assert!(f.is_actionable());
        let params = f.to_params(5);
        assert_eq!(params.scope.as_deref(), Some("auth"));
        assert!(params.intents.is_empty());
        assert_eq!(params.limit, 5);
    }

    #[test]
    fn context_mode_tags() {
        assert_eq!(ContextMode::ModelEnhanced.as_str(), "model-enhanced");
        assert_eq!(
            serde_json::to_string(&ContextMode::Recency).unwrap(),
            "\"recency\""
        );
    }
}
