use trailhead_core::{CommitSummary, ContextMode};

/// Boundary end marker. The start marker carries the mode tag.
pub const BOUNDARY_END: &str = "<!-- trailhead:end -->";

pub fn boundary_start(mode: ContextMode) -> String {
    format!("<!-- trailhead:start mode=\"{mode}\" -->")
}

/// Wrap context content with boundary markers for multi-plugin coexistence.
pub fn wrap_boundary(mode: ContextMode, content: &str) -> String {
    format!("{}\n{content}\n{BOUNDARY_END}", boundary_start(mode))
}

/// One line per commit: date, short hash, subject, then intent and scopes.
pub fn commit_line(c: &CommitSummary) -> String {
    let date = c.date.get(..10).unwrap_or(&c.date);
    let mut line = format!("- {date} {} {}", c.short_hash(), c.subject);
    let mut tags: Vec<String> = Vec::new();
    if let Some(intent) = c.intent {
        tags.push(intent.to_string());
    }
    if !c.scope.is_empty() {
        tags.push(c.scope.join(", "));
    }
    if !tags.is_empty() {
        line.push_str(&format!(" [{}]", tags.join("; ")));
    }
    line
}

/// Markdown listing of commits and rejected alternatives. At most
/// `max_decisions` decided-against entries are shown.
pub fn listing(
    mode: ContextMode,
    commits: &[CommitSummary],
    decisions: &[CommitSummary],
    max_decisions: usize,
) -> String {
    let mut out = format!("## Relevant history ({mode})\n");
    for c in commits {
        out.push_str(&commit_line(c));
        out.push('\n');
    }

    let entries: Vec<String> = decisions
        .iter()
        .flat_map(|c| {
            c.decided_against
                .iter()
                .map(move |d| format!("- {d} ({})", c.short_hash()))
        })
        .take(max_decisions)
        .collect();
    if !entries.is_empty() {
        out.push_str("\n### Decided against\n");
        for e in entries {
            out.push_str(&e);
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// Truncate content to fit within the char budget, preserving UTF-8 boundaries.
pub fn apply_budget(content: &str, budget: usize) -> String {
    if content.len() <= budget {
        return content.to_string();
    }
    let mut cut = content.len().min(budget.saturating_sub(50));
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n\n... (truncated to {} char budget)",
        &content[..cut],
        budget
    )
}

/// Budgeted, boundary-wrapped block. The markers are never truncated.
pub fn render_block(mode: ContextMode, content: &str, max_chars: usize) -> String {
    wrap_boundary(mode, &apply_budget(content, max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailhead_core::Intent;

    fn commit(hash: &str, subject: &str, decided: &[&str]) -> CommitSummary {
        CommitSummary {
            hash: hash.into(),
            date: "2025-04-01T12:00:00+02:00".into(),
            subject: subject.into(),
            intent: Some(Intent::FixDefect),
            scope: vec!["auth/session".into()],
            session: None,
            decided_against: decided.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn boundary_carries_mode() {
        let out = wrap_boundary(ContextMode::Recency, "body");
        assert!(out.starts_with("<!-- trailhead:start mode=\"recency\" -->\n"));
        assert!(out.ends_with("\n<!-- trailhead:end -->"));
    }

    #[test]
    fn commit_line_format() {
        let line = commit_line(&commit("0123456789", "fix expiry", &[]));
        assert_eq!(line, "- 2025-04-01 0123456 fix expiry [fix-defect; auth/session]");
    }

    #[test]
    fn listing_caps_decisions() {
        let c = commit("abcdef12", "pick store", &["redis (ops)", "memcached (no persistence)"]);
        let out = listing(ContextMode::Heuristic, &[c.clone()], &[c], 1);
        assert!(out.starts_with("## Relevant history (heuristic)\n"));
        assert!(out.contains("### Decided against\n- redis (ops) (abcdef1)"));
        assert!(!out.contains("memcached"));
    }

    #[test]
    fn apply_budget_no_truncation() {
        assert_eq!(apply_budget("short content", 4000), "short content");
    }

    #[test]
    fn apply_budget_truncates_on_char_boundary() {
        let content = "é".repeat(3000);
        let result = apply_budget(&content, 501);
        assert!(result.len() <= 560);
        assert!(result.contains("truncated"));
    }

    #[test]
    fn render_block_keeps_markers() {
        let out = render_block(ContextMode::ModelEnhanced, &"x".repeat(10_000), 300);
        assert!(out.starts_with("<!-- trailhead:start mode=\"model-enhanced\" -->"));
        assert!(out.ends_with(BOUNDARY_END));
    }
}
