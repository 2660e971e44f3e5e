//! Pure filters, `items → items`, generic over [`TrailerView`] so the same
//! chain runs on full records (scan path) and index summaries (index path).

use std::collections::HashSet;

use trailhead_core::{scope_matches, CommitHash, Intent, QueryParams, TrailerView, WordMatcher};
use trailhead_index::TrailerIndex;

/// Keep items whose intent is any of `intents`. Empty list: no filtering.
pub fn filter_intents<T: TrailerView>(items: Vec<T>, intents: &[Intent]) -> Vec<T> {
    if intents.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|c| c.intent().is_some_and(|i| intents.contains(&i)))
        .collect()
}

/// Keep items with at least one scope under `pattern`.
pub fn filter_scope<T: TrailerView>(items: Vec<T>, pattern: Option<&str>) -> Vec<T> {
    let Some(pattern) = pattern else {
        return items;
    };
    items
        .into_iter()
        .filter(|c| c.scopes().iter().any(|s| scope_matches(s, pattern)))
        .collect()
}

pub fn filter_session<T: TrailerView>(items: Vec<T>, session: Option<&str>) -> Vec<T> {
    let Some(session) = session else {
        return items;
    };
    items
        .into_iter()
        .filter(|c| c.session().map(str::trim) == Some(session))
        .collect()
}

pub fn filter_decisions_only<T: TrailerView>(items: Vec<T>, on: bool) -> Vec<T> {
    if !on {
        return items;
    }
    items
        .into_iter()
        .filter(|c| !c.decided_against().is_empty())
        .collect()
}

/// Keep items with a decided-against entry containing `keyword` as a whole
/// token.
pub fn filter_decided_against<T: TrailerView>(items: Vec<T>, keyword: Option<&str>) -> Vec<T> {
    let Some(matcher) = keyword.and_then(WordMatcher::new) else {
        return items;
    };
    items
        .into_iter()
        .filter(|c| matcher.matches_any(c.decided_against()))
        .collect()
}

pub fn apply_limit<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    items.truncate(limit.max(1));
    items
}

/// Every predicate filter in the fixed order, without the limit.
pub fn apply_predicates<T: TrailerView>(items: Vec<T>, params: &QueryParams) -> Vec<T> {
    let items = filter_intents(items, &params.intents);
    let items = filter_scope(items, params.scope_filter());
    let items = filter_session(items, params.session_filter());
    let items = filter_decisions_only(items, params.decisions_only);
    filter_decided_against(items, params.decided_against_filter())
}

/// intents → scope → session → decisions_only → decided_against → limit.
pub fn apply_filters<T: TrailerView>(items: Vec<T>, params: &QueryParams) -> Vec<T> {
    apply_limit(apply_predicates(items, params), params.limit)
}

/// Candidate hashes from the inverted maps, one set per active filter,
/// intersected. Coarse for decided-against: callers re-apply
/// [`apply_filters`] for word-boundary precision. No active filter gives
/// an empty set.
pub fn query_index_for_hashes(index: &TrailerIndex, params: &QueryParams) -> HashSet<CommitHash> {
    let mut acc: Option<HashSet<CommitHash>> = None;
    let mut narrow = |set: HashSet<CommitHash>| {
        acc = Some(match acc.take() {
            Some(prev) => prev.intersection(&set).cloned().collect(),
            None => set,
        });
    };

    if !params.intents.is_empty() {
        narrow(
            params
                .intents
                .iter()
                .flat_map(|i| index.intent_hashes(*i))
                .cloned()
                .collect(),
        );
    }
    if let Some(pattern) = params.scope_filter() {
        narrow(
            index
                .by_scope
                .iter()
                .filter(|(key, _)| scope_matches(key, pattern))
                .flat_map(|(_, hashes)| hashes.iter().cloned())
                .collect(),
        );
    }
    if let Some(session) = params.session_filter() {
        narrow(
            index
                .by_session
                .get(session)
                .map(|hashes| hashes.iter().cloned().collect())
                .unwrap_or_default(),
        );
    }
    if params.decisions_only || params.decided_against_filter().is_some() {
        narrow(index.with_decided_against.iter().cloned().collect());
    }

    acc.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailhead_core::CommitSummary;

    fn summary(hash: &str, intent: Option<Intent>, scope: &[&str]) -> CommitSummary {
        CommitSummary {
            hash: hash.into(),
            date: "2025-01-01T00:00:00Z".into(),
            subject: format!("subject {hash}"),
            intent,
            scope: scope.iter().map(|s| s.to_string()).collect(),
            session: None,
            decided_against: Vec::new(),
        }
    }

    #[test]
    fn intents_union() {
        let items = vec![
            summary("a1", Some(Intent::FixDefect), &[]),
            summary("b2", Some(Intent::Restructure), &[]),
            summary("c3", Some(Intent::Explore), &[]),
            summary("d4", None, &[]),
        ];
        let kept = filter_intents(items, &[Intent::FixDefect, Intent::Explore]);
        let hashes: Vec<_> = kept.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a1", "c3"]);
    }

    #[test]
    fn scope_is_hierarchical() {
        let items = vec![
            summary("a1", None, &["auth/registration"]),
            summary("b2", None, &["oauth/provider"]),
            summary("c3", None, &["authentication"]),
            summary("d4", None, &["billing", "auth"]),
        ];
        let kept = filter_scope(items, Some("auth"));
        let hashes: Vec<_> = kept.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a1", "d4"]);
    }

    #[test]
    fn filters_and_together_then_limit() {
        let mut a = summary("a1", Some(Intent::FixDefect), &["auth"]);
        a.session = Some("2025-01-01/login".into());
        a.decided_against = vec!["Redis pub/sub (no persistence)".into()];
        let mut b = summary("b2", Some(Intent::FixDefect), &["auth"]);
        b.decided_against = vec!["predis PHP client".into()];
        let c = summary("c3", Some(Intent::FixDefect), &["billing"]);

        let params = QueryParams {
            intents: vec![Intent::FixDefect],
            scope: Some("auth".into()),
            decided_against: Some("redis".into()),
            ..QueryParams::default()
        };
        let kept = apply_filters(vec![a.clone(), b.clone(), c.clone()], &params);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].hash, "a1");

        let params = QueryParams {
            session: Some("2025-01-01/login".into()),
            ..QueryParams::default()
        };
        assert_eq!(apply_filters(vec![a.clone(), b.clone(), c.clone()], &params).len(), 1);

        let params = QueryParams {
            decisions_only: true,
            limit: 1,
            ..QueryParams::default()
        };
        let kept = apply_filters(vec![a, b, c], &params);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].hash, "a1");
    }

    #[test]
    fn blank_filters_are_inactive() {
        let items = vec![summary("a1", None, &[]), summary("b2", None, &[])];
        let params = QueryParams {
            scope: Some("  ".into()),
            decided_against: Some(String::new()),
            ..QueryParams::default()
        };
        assert!(!params.is_filtered());
        assert_eq!(apply_filters(items, &params).len(), 2);
    }

    #[test]
    fn index_hashes_empty_without_filters() {
        let index = trailhead_index::build_from_commits("abcd", &[], "2025-01-01T00:00:00Z");
        assert!(query_index_for_hashes(&index, &QueryParams::default()).is_empty());
    }
}
