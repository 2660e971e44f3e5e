//! Matching primitives shared by the index, the query filters, and the
//! context pipeline.
//!
//! Both predicates are exact: a scope is a path hierarchy, not a string to
//! search inside, and a keyword is a whole token, not a substring.

use regex::Regex;

/// Hierarchical scope match, case-insensitive.
///
/// True iff `value == pattern` or `value` starts with `pattern + "/"`.
/// `"auth/registration"` matches `"auth"`; `"oauth/provider"` and
/// `"authentication"` do not.
pub fn scope_matches(value: &str, pattern: &str) -> bool {
    let value = value.trim().to_lowercase();
    let pattern = pattern.trim().trim_end_matches('/').to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    if value == pattern {
        return true;
    }
    value
        .strip_prefix(&pattern)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Case-insensitive whole-token match of `keyword` inside `text`.
///
/// `"redis"` matches `"Redis pub/sub"` but not `"predis"`, `"jedis"` or
/// `"redistribution"`. Any input is accepted; an empty keyword never matches.
pub fn word_boundary_match(text: &str, keyword: &str) -> bool {
    WordMatcher::new(keyword).is_some_and(|m| m.is_match(text))
}

/// Compiled word-boundary matcher for repeated use over many records.
#[derive(Debug, Clone)]
pub struct WordMatcher {
    re: Regex,
}

impl WordMatcher {
    /// Returns `None` for a blank keyword.
    ///
    /// Boundaries are "string edge or non-word character" on both sides, so
    /// keywords that start or end with punctuation (`c++`, `.env`) still
    /// bound correctly.
    pub fn new(keyword: &str) -> Option<Self> {
        let kw = keyword.trim();
        if kw.is_empty() {
            return None;
        }
        let pattern = format!(r"(?i)(?:^|\W){}(?:$|\W)", regex::escape(kw));
        Regex::new(&pattern).ok().map(|re| Self { re })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    /// True if any of `texts` matches.
    pub fn matches_any<S: AsRef<str>>(&self, texts: &[S]) -> bool {
        texts.iter().any(|t| self.is_match(t.as_ref()))
    }
}
