pub mod engine;
pub mod filters;

pub use engine::{query_index, scan_summaries, QueryEngine, ScanFallback};
pub use filters::{
    apply_filters, apply_limit, apply_predicates, filter_decided_against, filter_decisions_only,
    filter_intents, filter_scope, filter_session, query_index_for_hashes,
};

use trailhead_core::CommitSummary;

// ── Human-readable formatting ────────────────────────────────────────

pub fn format_human(results: &[CommitSummary]) -> String {
    if results.is_empty() {
        return "No results found.\n".to_string();
    }
    let mut out = String::new();
    for c in results {
        let date = c.date.get(..10).unwrap_or(&c.date);
        out.push_str(&format!("{}  {}  {}\n", c.short_hash(), date, c.subject));
        let mut meta = Vec::new();
        if let Some(intent) = c.intent {
            meta.push(format!("intent: {intent}"));
        }
        if !c.scope.is_empty() {
            meta.push(format!("scope: {}", c.scope.join(", ")));
        }
        if let Some(session) = &c.session {
            meta.push(format!("session: {session}"));
        }
        if !meta.is_empty() {
            out.push_str(&format!("  {}\n", meta.join(" | ")));
        }
        for d in &c.decided_against {
            out.push_str(&format!("  decided against: {d}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailhead_core::Intent;

    #[test]
    fn format_lists_metadata() {
        let c = CommitSummary {
            hash: "0123456789abcdef".into(),
            date: "2025-01-02T03:04:05Z".into(),
            subject: "add login".into(),
            intent: Some(Intent::EnableCapability),
            scope: vec!["auth/login".into()],
            session: None,
            decided_against: vec!["magic links (email deliverability)".into()],
        };
        let out = format_human(&[c]);
        assert!(out.starts_with("0123456  2025-01-02  add login\n"));
        assert!(out.contains("intent: enable-capability | scope: auth/login"));
        assert!(out.contains("decided against: magic links"));
    }

    #[test]
    fn format_empty() {
        assert_eq!(format_human(&[]), "No results found.\n");
    }
}
