//! Raw log block → `StructuredCommit`.
//!
//! A block is `hash \x1f date \x1f message`, blocks separated by `\x1e`
//! (the shape produced by [`GIT_LOG_FORMAT`]). Decoding is a tagged step:
//! every block yields either a commit (plus non-fatal diagnostics) or a
//! [`ParseError`]. Unknown trailer keys are left in the body.

use crate::types::{Classification, Intent, StructuredCommit};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Record separator between blocks.
pub const RECORD_SEP: char = '\u{1e}';
/// Field separator inside a block.
pub const FIELD_SEP: char = '\u{1f}';
/// `git log --format` string that produces the block layout above.
pub const GIT_LOG_FORMAT: &str = "%x1e%H%x1f%aI%x1f%B";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("block is missing the {0} field")]
    MissingField(&'static str),
    #[error("invalid commit hash {0:?}")]
    InvalidHash(String),
    #[error("commit {0} has an empty message")]
    EmptyMessage(String),
}

/// A decoded block plus diagnostics for trailer values that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub commit: StructuredCommit,
    pub warnings: Vec<String>,
}

/// Split raw `git log` output into blocks and decode each one.
pub fn parse_log(raw: &str) -> Vec<Result<ParsedRecord, ParseError>> {
    split_blocks(raw).map(parse_record).collect()
}

/// Iterate over the non-blank blocks of raw log output.
pub fn split_blocks(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(RECORD_SEP).filter(|b| !b.trim().is_empty())
}

/// Decode one block.
pub fn parse_record(block: &str) -> Result<ParsedRecord, ParseError> {
    let mut fields = block.trim_start_matches(['\n', '\r']).splitn(3, FIELD_SEP);
    let hash = fields
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("hash"))?;
    if !is_hex_hash(hash) {
        return Err(ParseError::InvalidHash(hash.to_string()));
    }
    let date = fields
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("date"))?;
    let message = fields.next().ok_or(ParseError::MissingField("message"))?;
    let message = message.trim();
    if message.is_empty() {
        return Err(ParseError::EmptyMessage(hash.to_string()));
    }

    let mut lines = message.lines();
    let header = lines.next().unwrap_or_default().trim();
    let (classification, header_scope, bang, subject) = parse_header(header);

    let rest: Vec<&str> = lines.collect();
    let (prose, trailer_block) = split_trailer_block(&rest);

    let mut trailers = TrailerSet::default();
    let mut warnings = Vec::new();
    let mut body_lines: Vec<&str> = prose.to_vec();
    let mut last_trailer: Option<(TrailerKey, usize)> = None;

    for &line in trailer_block {
        if line.starts_with([' ', '\t']) && !line.trim().is_empty() {
            if let Some((key, idx)) = last_trailer {
                trailers.extend_last(key, idx, line.trim());
                continue;
            }
        }
        match split_trailer(line) {
            Some((key, value)) => {
                let idx = trailers.push(key, value);
                last_trailer = Some((key, idx));
            }
            None => {
                last_trailer = None;
                body_lines.push(line);
            }
        }
    }

    let intent = trailers.intent(&mut warnings);
    let breaking = trailers
        .first(TrailerKey::Breaking)
        .or_else(|| bang.then(|| subject.clone()));

    let commit = StructuredCommit {
        hash: hash.to_string(),
        date: date.to_string(),
        classification,
        header_scope,
        subject,
        body: body_lines.join("\n").trim().to_string(),
        intent,
        scope: trailers.scopes(),
        decided_against: trailers.all(TrailerKey::DecidedAgainst),
        session: trailers.first(TrailerKey::Session),
        refs: trailers.list(TrailerKey::Refs),
        context: trailers.context(&mut warnings),
        breaking,
    };
    Ok(ParsedRecord { commit, warnings })
}

fn is_hex_hash(s: &str) -> bool {
    (4..=64).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

// ── Header ──

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<kind>[A-Za-z]+)(?:\((?P<scope>[^)]*)\))?(?P<bang>!)?:\s*(?P<subject>.+)$")
            .expect("static header regex")
    })
}

/// `type(scope)!: subject` → (classification, header scope, breaking marker, subject).
fn parse_header(header: &str) -> (Classification, Option<String>, bool, String) {
    if let Some(caps) = header_regex().captures(header) {
        if let Some(class) = Classification::from_token(&caps["kind"]) {
            let scope = caps
                .name("scope")
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            let bang = caps.name("bang").is_some();
            return (class, scope, bang, caps["subject"].trim().to_string());
        }
    }
    (Classification::Other, None, false, header.to_string())
}

// ── Trailers ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrailerKey {
    Intent,
    Scope,
    DecidedAgainst,
    Session,
    Refs,
    Context,
    Breaking,
}

impl TrailerKey {
    fn from_key(key: &str) -> Option<Self> {
        let k = key.trim().to_lowercase().replace('_', "-");
        let t = match k.as_str() {
            "intent" => TrailerKey::Intent,
            "scope" => TrailerKey::Scope,
            "decided-against" => TrailerKey::DecidedAgainst,
            "session" => TrailerKey::Session,
            "refs" | "ref" => TrailerKey::Refs,
            "context" => TrailerKey::Context,
            "breaking" | "breaking change" | "breaking-change" => TrailerKey::Breaking,
            _ => return None,
        };
        Some(t)
    }
}

fn trailer_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_ -]*:(\s|$)").expect("static trailer line regex")
    })
}

/// Split `lines` into prose and the final paragraph when that paragraph is
/// a trailer block: every line is `Token: value` or a continuation, and at
/// least one names a known key. Otherwise everything is prose.
fn split_trailer_block<'s, 'a>(lines: &'s [&'a str]) -> (&'s [&'a str], &'s [&'a str]) {
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    let start = lines[..end]
        .iter()
        .rposition(|l| l.trim().is_empty())
        .map_or(0, |i| i + 1);
    let block = &lines[start..end];
    let is_trailer_block = !block.is_empty()
        && block
            .iter()
            .all(|l| l.starts_with([' ', '\t']) || trailer_line_regex().is_match(l))
        && block.iter().any(|l| split_trailer(l).is_some());
    if is_trailer_block {
        (&lines[..start], block)
    } else {
        (&lines[..end], &[])
    }
}

/// Recognise `Key: value` for known keys only.
fn split_trailer(line: &str) -> Option<(TrailerKey, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.starts_with([' ', '\t']) {
        return None;
    }
    let key = TrailerKey::from_key(key)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

#[derive(Default)]
struct TrailerSet {
    entries: Vec<(TrailerKey, String)>,
}

impl TrailerSet {
    fn push(&mut self, key: TrailerKey, value: &str) -> usize {
        self.entries.push((key, value.to_string()));
        self.entries.len() - 1
    }

    fn extend_last(&mut self, key: TrailerKey, idx: usize, continuation: &str) {
        if let Some((k, v)) = self.entries.get_mut(idx) {
            if *k == key {
                v.push(' ');
                v.push_str(continuation);
            }
        }
    }

    fn values(&self, key: TrailerKey) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn first(&self, key: TrailerKey) -> Option<String> {
        self.values(key).next().map(str::to_string)
    }

    fn all(&self, key: TrailerKey) -> Vec<String> {
        self.values(key).map(str::to_string).collect()
    }

    /// Comma-separated values across every occurrence of `key`, de-duplicated.
    fn list(&self, key: TrailerKey) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for v in self.values(key) {
            for item in v.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !out.iter().any(|o| o == item) {
                    out.push(item.to_string());
                }
            }
        }
        out
    }

    fn scopes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for item in self.list(TrailerKey::Scope) {
            let norm = item.trim_matches('/').to_lowercase();
            if !norm.is_empty() && !out.contains(&norm) {
                out.push(norm);
            }
        }
        out
    }

    fn intent(&self, warnings: &mut Vec<String>) -> Option<Intent> {
        let mut found = None;
        for v in self.values(TrailerKey::Intent) {
            match Intent::parse(v) {
                Some(i) if found.is_none() => found = Some(i),
                Some(_) => {}
                None => warnings.push(format!("unknown intent {v:?} dropped")),
            }
        }
        found
    }

    fn context(&self, warnings: &mut Vec<String>) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for v in self.values(TrailerKey::Context) {
            if v.starts_with('{') {
                match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(v) {
                    Ok(obj) => {
                        for (k, val) in obj {
                            let s = match val {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            };
                            map.insert(k, s);
                        }
                    }
                    Err(_) => warnings.push(format!("unparseable context object {v:?} dropped")),
                }
                continue;
            }
            for pair in v.split([';', ',']).map(str::trim).filter(|s| !s.is_empty()) {
                match pair.split_once('=') {
                    Some((k, val)) if !k.trim().is_empty() => {
                        map.insert(k.trim().to_string(), val.trim().to_string());
                    }
                    _ => warnings.push(format!("context entry {pair:?} is not key=value")),
                }
            }
        }
        map
    }
}
