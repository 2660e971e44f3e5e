//! Turning signals and follow-ups into candidate commits.

use std::collections::HashSet;

use trailhead_core::{scope_matches, CommitSummary, FollowUpQuery, PromptSignals, QueryParams};
use trailhead_query::QueryEngine;

use crate::settings::ModeCaps;

/// Commits to list plus commits whose decided-against entries to surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub commits: Vec<CommitSummary>,
    pub decisions: Vec<CommitSummary>,
}

impl Candidates {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.decisions.is_empty()
    }

    fn seen(&self) -> HashSet<String> {
        self.commits
            .iter()
            .chain(&self.decisions)
            .map(|c| c.hash.clone())
            .collect()
    }
}

/// Append `items` not already in `into`, up to `cap` total.
fn merge_new(into: &mut Vec<CommitSummary>, items: Vec<CommitSummary>, cap: usize) -> usize {
    let mut added = 0;
    for item in items {
        if into.len() >= cap {
            break;
        }
        if into.iter().any(|c| c.hash == item.hash) {
            continue;
        }
        into.push(item);
        added += 1;
    }
    added
}

/// Resolve signals into candidates.
///
/// Each scope hint is queried together with the intent hints, falling back
/// to the scope alone when that combination is empty. Intent hints without
/// any scope hint are queried on their own. Keywords become decided-against
/// lookups. Commits carrying decided-against entries are also surfaced as
/// decisions.
pub fn resolve_signals(
    engine: &QueryEngine<'_>,
    signals: &PromptSignals,
    caps: ModeCaps,
) -> Candidates {
    let mut out = Candidates::default();

    for scope in &signals.scope_hints {
        let mut params = QueryParams {
            scope: Some(scope.clone()),
            intents: signals.intent_hints.clone(),
            ..QueryParams::default()
        }
        .with_limit(caps.commits);
        let mut hits = engine.query(&params);
        if hits.is_empty() && !params.intents.is_empty() {
            params.intents.clear();
            hits = engine.query(&params);
        }
        merge_new(&mut out.commits, hits, caps.commits);
    }

    if signals.scope_hints.is_empty() && !signals.intent_hints.is_empty() {
        let params = QueryParams {
            intents: signals.intent_hints.clone(),
            ..QueryParams::default()
        }
        .with_limit(caps.commits);
        merge_new(&mut out.commits, engine.query(&params), caps.commits);
    }

    if caps.decisions > 0 {
        for keyword in &signals.keywords {
            let params = QueryParams {
                decided_against: Some(keyword.clone()),
                ..QueryParams::default()
            }
            .with_limit(caps.decisions);
            merge_new(&mut out.decisions, engine.query(&params), caps.decisions);
        }
        let with_decisions: Vec<CommitSummary> = out
            .commits
            .iter()
            .filter(|c| !c.decided_against.is_empty())
            .cloned()
            .collect();
        merge_new(&mut out.decisions, with_decisions, caps.decisions);
    }

    out
}

/// Follow-up as query params, or `None` when it cannot contribute: not
/// actionable, or its scope is not a prefix of any known scope.
pub fn validate_follow_up(
    fu: &FollowUpQuery,
    known_scopes: &[String],
    limit: usize,
) -> Option<QueryParams> {
    if !fu.is_actionable() {
        return None;
    }
    let params = fu.to_params(limit);
    if let Some(scope) = params.scope_filter() {
        if !known_scopes.iter().any(|k| scope_matches(k, scope)) {
            tracing::debug!(scope, "follow-up scope unknown, ignored");
            return None;
        }
    }
    Some(params)
}

/// Merge follow-up results into `candidates`. Only hashes not already
/// present are added, and never past the mode caps. Returns how many
/// commits were added.
pub fn apply_follow_ups(
    engine: &QueryEngine<'_>,
    follow_ups: &[FollowUpQuery],
    known_scopes: &[String],
    candidates: &mut Candidates,
    caps: ModeCaps,
) -> usize {
    let mut added = 0;
    for fu in follow_ups {
        let Some(params) = validate_follow_up(fu, known_scopes, caps.commits) else {
            continue;
        };
        let seen = candidates.seen();
        let fresh: Vec<CommitSummary> = engine
            .query(&params)
            .into_iter()
            .filter(|c| !seen.contains(&c.hash))
            .collect();
        added += if params.decided_against_filter().is_some() {
            merge_new(&mut candidates.decisions, fresh, caps.decisions)
        } else {
            merge_new(&mut candidates.commits, fresh, caps.commits)
        };
    }
    added
}
