//! Local prompt signal extraction: scope vocabulary, intent synonyms,
//! keywords. No I/O.

use trailhead_core::{word_boundary_match, Intent, PromptSignals};

pub const MAX_SCOPE_HINTS: usize = 3;
pub const MAX_KEYWORDS: usize = 5;
const MIN_KEYWORD_LEN: usize = 4;

/// Prompt words that imply an intent.
const INTENT_SYNONYMS: &[(&str, Intent)] = &[
    ("bug", Intent::FixDefect),
    ("bugs", Intent::FixDefect),
    ("fix", Intent::FixDefect),
    ("broken", Intent::FixDefect),
    ("error", Intent::FixDefect),
    ("crash", Intent::FixDefect),
    ("regression", Intent::FixDefect),
    ("failing", Intent::FixDefect),
    ("add", Intent::EnableCapability),
    ("implement", Intent::EnableCapability),
    ("support", Intent::EnableCapability),
    ("enable", Intent::EnableCapability),
    ("feature", Intent::EnableCapability),
    ("refactor", Intent::Restructure),
    ("restructure", Intent::Restructure),
    ("rename", Intent::Restructure),
    ("split", Intent::Restructure),
    ("extract", Intent::Restructure),
    ("cleanup", Intent::Restructure),
    ("slow", Intent::ImproveQuality),
    ("performance", Intent::ImproveQuality),
    ("optimize", Intent::ImproveQuality),
    ("quality", Intent::ImproveQuality),
    ("test", Intent::ImproveQuality),
    ("tests", Intent::ImproveQuality),
    ("deploy", Intent::ConfigureInfra),
    ("ci", Intent::ConfigureInfra),
    ("docker", Intent::ConfigureInfra),
    ("config", Intent::ConfigureInfra),
    ("infra", Intent::ConfigureInfra),
    ("pipeline", Intent::ConfigureInfra),
    ("docs", Intent::Document),
    ("document", Intent::Document),
    ("documentation", Intent::Document),
    ("readme", Intent::Document),
    ("spike", Intent::Explore),
    ("explore", Intent::Explore),
    ("prototype", Intent::Explore),
    ("experiment", Intent::Explore),
    ("investigate", Intent::Explore),
    ("blocked", Intent::ResolveBlocker),
    ("unblock", Intent::ResolveBlocker),
    ("workaround", Intent::ResolveBlocker),
    ("stuck", Intent::ResolveBlocker),
];

const STOPWORDS: &[&str] = &[
    "about", "above", "across", "after", "again", "against", "also", "always", "anything",
    "because", "been", "before", "being", "below", "between", "both", "cannot", "change",
    "changes", "code", "could", "currently", "current", "does", "doing", "done", "down", "each",
    "either", "ever", "every", "file", "files", "from", "further", "getting", "have", "having",
    "help", "here", "into", "just", "know", "like", "look", "make", "making", "maybe", "more",
    "most", "much", "must", "need", "needs", "never", "next", "only", "other", "ours", "over",
    "please", "really", "right", "same", "should", "since", "some", "something", "still", "such",
    "sure", "take", "than", "that", "their", "them", "then", "there", "these", "they", "thing",
    "things", "think", "this", "those", "through", "under", "until", "used", "using", "very",
    "want", "were", "what", "when", "where", "which", "while", "will", "with", "within",
    "without", "work", "working", "would", "your", "yours", "instead", "able", "why",
];

/// Scope hints, intent hints and keywords from `prompt`, using
/// `known_scopes` as the scope vocabulary.
pub fn extract_heuristic(prompt: &str, known_scopes: &[String]) -> PromptSignals {
    if prompt.trim().is_empty() {
        return PromptSignals::default();
    }
    let scope_hints = scope_hints(prompt, known_scopes);
    let intent_hints = intent_hints(prompt);
    let keywords = keywords(prompt, &scope_hints);
    PromptSignals {
        scope_hints,
        intent_hints,
        keywords,
    }
}

/// Known scope prefixes mentioned in the prompt, either verbatim
/// (`auth/registration`) or by their last segment (`registration`).
/// Most specific first.
pub fn scope_hints(prompt: &str, known_scopes: &[String]) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();
    for scope in known_scopes {
        let segments: Vec<&str> = scope.split('/').filter(|s| !s.is_empty()).collect();
        for depth in 1..=segments.len() {
            let prefix = segments[..depth].join("/");
            if hints.contains(&prefix) {
                continue;
            }
            let last = segments[depth - 1];
            let named = word_boundary_match(prompt, &prefix)
                || (last.len() >= 3 && word_boundary_match(prompt, last));
            if named {
                hints.push(prefix);
            }
        }
    }
    hints.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));
    hints.truncate(MAX_SCOPE_HINTS);
    hints
}

fn depth(scope: &str) -> usize {
    scope.matches('/').count()
}

pub fn intent_hints(prompt: &str) -> Vec<Intent> {
    let mut out = Vec::new();
    for (word, intent) in INTENT_SYNONYMS {
        if !out.contains(intent) && word_boundary_match(prompt, word) {
            out.push(*intent);
        }
    }
    out
}

/// Distinctive prompt tokens for decided-against lookups. Stopwords,
/// intent synonyms, and words already used as scope hints are skipped.
pub fn keywords(prompt: &str, scope_hints: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in prompt.split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '#'))) {
        let token = raw.trim_matches(|c: char| matches!(c, '-' | '_' | '.')).to_lowercase();
        if token.chars().count() < MIN_KEYWORD_LEN
            || token.chars().all(|c| c.is_ascii_digit())
            || STOPWORDS.contains(&token.as_str())
            || INTENT_SYNONYMS.iter().any(|(w, _)| *w == token)
            || scope_hints
                .iter()
                .any(|s| s.split('/').any(|seg| seg == token))
            || out.contains(&token)
        {
            continue;
        }
        out.push(token);
        if out.len() == MAX_KEYWORDS {
            break;
        }
    }
    out
}
