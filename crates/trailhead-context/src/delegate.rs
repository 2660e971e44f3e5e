//! The three delegated sub-calls: signal extraction, follow-up proposal,
//! and listing compression. Any failure yields a neutral result; callers
//! only see `Err` for the call itself so the pipeline can log the cause.

use serde_json::Value;
use trailhead_core::{FollowUpQuery, Intent, PromptSignals};
use trailhead_model::{extract_json, ModelClient, ModelConfig, ModelError};

use crate::signals::{MAX_KEYWORDS, MAX_SCOPE_HINTS};

/// Scopes listed in the extraction prompt.
const MAX_SCOPES_IN_PROMPT: usize = 200;

const SIGNALS_SYSTEM: &str = "You map a developer's request to structured filters over a git \
history annotated with commit trailers. Reply with a single JSON object and nothing else: \
{\"scope_hints\": [string], \"intent_hints\": [string], \"keywords\": [string]}. \
scope_hints must be taken from the known scopes list. intent_hints must be among: \
enable-capability, fix-defect, improve-quality, restructure, configure-infra, document, \
explore, resolve-blocker. keywords are short technology or approach names worth checking \
against previously rejected alternatives. Use empty lists when nothing applies.";

const FOLLOW_UP_SYSTEM: &str = "You refine a history lookup. Given a developer's request and \
the commits found so far, propose at most two additional queries that would surface missing \
relevant history. Reply with a JSON array and nothing else; each element is \
{\"scope\": string|null, \"intent\": string|null, \"decided_against\": string|null}. \
Reply [] when the listing is already sufficient.";

const COMPRESS_SYSTEM: &str = "Summarize the commit history listing for a coding agent working \
on the given request. Keep commit short hashes, rejected alternatives and their reasons. \
Plain prose, no preamble, at most a few short paragraphs.";

pub fn extract_signals(
    client: &dyn ModelClient,
    model: &ModelConfig,
    prompt: &str,
    known_scopes: &[String],
) -> Result<PromptSignals, ModelError> {
    let scopes: Vec<&str> = known_scopes
        .iter()
        .take(MAX_SCOPES_IN_PROMPT)
        .map(String::as_str)
        .collect();
    let user = format!(
        "Known scopes: {}\n\nRequest:\n{}",
        if scopes.is_empty() {
            "(none)".to_string()
        } else {
            scopes.join(", ")
        },
        prompt.trim()
    );
    let reply = client.call(SIGNALS_SYSTEM, &user, model.max_tokens, model.timeout)?;
    Ok(decode_signals(&reply))
}

/// Neutral (empty) signals when the reply has no usable object.
pub fn decode_signals(reply: &str) -> PromptSignals {
    let Some(Value::Object(obj)) = extract_json(reply) else {
        tracing::debug!("signal reply had no JSON object");
        return PromptSignals::default();
    };
    let strings = |key: &str| -> Vec<String> {
        obj.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut scope_hints: Vec<String> = Vec::new();
    for s in strings("scope_hints") {
        let s = s.trim_matches('/').to_lowercase();
        if !s.is_empty() && !scope_hints.contains(&s) {
            scope_hints.push(s);
        }
    }
    scope_hints.truncate(MAX_SCOPE_HINTS);

    let mut intent_hints: Vec<Intent> = Vec::new();
    for i in strings("intent_hints").iter().filter_map(|s| Intent::parse(s)) {
        if !intent_hints.contains(&i) {
            intent_hints.push(i);
        }
    }

    let mut keywords: Vec<String> = Vec::new();
    for k in strings("keywords") {
        let k = k.to_lowercase();
        if !keywords.contains(&k) {
            keywords.push(k);
        }
    }
    keywords.truncate(MAX_KEYWORDS);

    PromptSignals {
        scope_hints,
        intent_hints,
        keywords,
    }
}

pub fn propose_follow_ups(
    client: &dyn ModelClient,
    model: &ModelConfig,
    prompt: &str,
    listing: &str,
    max: usize,
) -> Result<Vec<FollowUpQuery>, ModelError> {
    let user = format!("Request:\n{}\n\nFound so far:\n{}", prompt.trim(), listing);
    let reply = client.call(FOLLOW_UP_SYSTEM, &user, model.max_tokens, model.timeout)?;
    Ok(decode_follow_ups(&reply, max))
}

/// Accepts a bare array or `{"follow_ups": [...]}`. Items naming an
/// unknown intent are dropped, as are non-actionable ones.
pub fn decode_follow_ups(reply: &str, max: usize) -> Vec<FollowUpQuery> {
    if max == 0 {
        return Vec::new();
    }
    let items = match extract_json(reply) {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut obj)) => match obj.remove("follow_ups") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let field = |item: &Value, key: &str| -> Option<String> {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut out = Vec::new();
    for item in &items {
        let intent = match field(item, "intent") {
            Some(raw) => match Intent::parse(&raw) {
                Some(i) => Some(i),
                None => {
                    tracing::debug!(intent = %raw, "follow-up names unknown intent");
                    continue;
                }
            },
            None => None,
        };
        let fu = FollowUpQuery {
            scope: field(item, "scope").map(|s| s.trim_matches('/').to_lowercase()),
            intent,
            decided_against: field(item, "decided_against"),
        };
        if fu.is_actionable() {
            out.push(fu);
        }
        if out.len() >= max {
            break;
        }
    }
    out
}

pub fn compress(
    client: &dyn ModelClient,
    model: &ModelConfig,
    prompt: &str,
    listing: &str,
) -> Result<Option<String>, ModelError> {
    let user = format!("Request:\n{}\n\nListing:\n{}", prompt.trim(), listing);
    let reply = client.call(COMPRESS_SYSTEM, &user, model.max_tokens, model.timeout)?;
    let text = strip_wrapping_fence(reply.trim());
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn strip_wrapping_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.find('\n').map_or("", |nl| &rest[nl + 1..]);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
