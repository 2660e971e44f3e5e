use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use trailhead_core::{CommitSummary, ContextMode};
use trailhead_index::TrailerIndex;
use trailhead_log::{GitLog, LogSource};
use trailhead_model::{ModelClient, ModelError};
use trailhead_query::QueryEngine;
use trailhead_store::StorePaths;

use crate::delegate;
use crate::render;
use crate::resolve::{apply_follow_ups, resolve_signals, Candidates};
use crate::settings::{ContextSettings, ModeCaps};
use crate::signals::extract_heuristic;

/// Pipeline states in preference order. Each either produces a block or
/// hands over to the next; there is no retry and no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ModelEnhanced,
    Heuristic,
    Recency,
}

impl Stage {
    pub const SEQUENCE: [Stage; 3] = [Stage::ModelEnhanced, Stage::Heuristic, Stage::Recency];

    pub fn mode(&self) -> ContextMode {
        match self {
            Stage::ModelEnhanced => ContextMode::ModelEnhanced,
            Stage::Heuristic => ContextMode::Heuristic,
            Stage::Recency => ContextMode::Recency,
        }
    }
}

/// Retrieved context before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub mode: ContextMode,
    pub commits: Vec<CommitSummary>,
    pub decisions: Vec<CommitSummary>,
    pub max_decisions: usize,
    /// Compressed prose replacing the listing, when compression succeeded.
    pub prose: Option<String>,
}

impl ContextBlock {
    fn new(mode: ContextMode, candidates: Candidates, caps: ModeCaps) -> Self {
        Self {
            mode,
            commits: candidates.commits,
            decisions: candidates.decisions,
            max_decisions: caps.decisions,
            prose: None,
        }
    }

    pub fn listing(&self) -> String {
        render::listing(self.mode, &self.commits, &self.decisions, self.max_decisions)
    }

    pub fn render(&self, max_chars: usize) -> String {
        let content = match &self.prose {
            Some(prose) => format!("## Relevant history ({})\n{prose}", self.mode),
            None => self.listing(),
        };
        render::render_block(self.mode, &content, max_chars)
    }
}

pub struct Pipeline<'a> {
    engine: &'a QueryEngine<'a>,
    settings: &'a ContextSettings,
    model: &'a dyn ModelClient,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        engine: &'a QueryEngine<'a>,
        settings: &'a ContextSettings,
        model: &'a dyn ModelClient,
    ) -> Self {
        Self {
            engine,
            settings,
            model,
        }
    }

    /// Walk the stages until one yields candidates.
    pub fn run(&self, prompt: &str) -> Option<ContextBlock> {
        let known_scopes = self.engine.known_scopes();
        for stage in Stage::SEQUENCE {
            let block = match stage {
                Stage::ModelEnhanced => self.model_enhanced(prompt, &known_scopes),
                Stage::Heuristic => self.heuristic(prompt, &known_scopes),
                Stage::Recency => self.recency(),
            };
            match block {
                Some(block) => {
                    tracing::debug!(mode = %block.mode, commits = block.commits.len(), "context assembled");
                    return Some(block);
                }
                None => tracing::debug!(?stage, "stage produced nothing, falling through"),
            }
        }
        None
    }

    fn model_enhanced(&self, prompt: &str, known_scopes: &[String]) -> Option<ContextBlock> {
        if prompt.trim().is_empty() {
            return None;
        }
        let model_cfg = &self.settings.model;
        let signals = delegate::extract_signals(self.model, model_cfg, prompt, known_scopes)
            .map_err(|e| log_model_failure("signal extraction", &e))
            .ok()?;
        if signals.is_empty() {
            return None;
        }

        let caps = self.settings.model_caps;
        let mut candidates = resolve_signals(self.engine, &signals, caps);
        if candidates.is_empty() {
            return None;
        }

        if self.settings.follow_ups > 0 {
            let listing = render::listing(
                ContextMode::ModelEnhanced,
                &candidates.commits,
                &candidates.decisions,
                caps.decisions,
            );
            match delegate::propose_follow_ups(
                self.model,
                model_cfg,
                prompt,
                &listing,
                self.settings.follow_ups,
            ) {
                Ok(follow_ups) => {
                    let added =
                        apply_follow_ups(self.engine, &follow_ups, known_scopes, &mut candidates, caps);
                    tracing::debug!(proposed = follow_ups.len(), added, "follow-ups applied");
                }
                Err(e) => log_model_failure("follow-up proposal", &e),
            }
        }

        let mut block = ContextBlock::new(ContextMode::ModelEnhanced, candidates, caps);
        if self.settings.compress {
            match delegate::compress(self.model, model_cfg, prompt, &block.listing()) {
                Ok(prose) => block.prose = prose,
                Err(e) => log_model_failure("compression", &e),
            }
        }
        Some(block)
    }

    fn heuristic(&self, prompt: &str, known_scopes: &[String]) -> Option<ContextBlock> {
        let signals = extract_heuristic(prompt, known_scopes);
        if signals.is_empty() {
            return None;
        }
        let caps = self.settings.heuristic_caps;
        let candidates = resolve_signals(self.engine, &signals, caps);
        if candidates.is_empty() {
            return None;
        }
        Some(ContextBlock::new(ContextMode::Heuristic, candidates, caps))
    }

    /// Most recent commits plus the most recent decided-against entries,
    /// from the index or, without one, from the bounded log scan.
    fn recency(&self) -> Option<ContextBlock> {
        let caps = self.settings.recency_caps;
        let candidates = match self.engine.index() {
            Some(index) => Candidates {
                commits: index.recent(caps.commits),
                decisions: index.decided_against_recent(caps.decisions),
            },
            None => {
                let mut scanned: Vec<CommitSummary> =
                    self.engine.scan_commits().iter().map(|c| c.summary()).collect();
                trailhead_index::sort_newest_first(&mut scanned);
                let decisions = scanned
                    .iter()
                    .filter(|c| !c.decided_against.is_empty())
                    .take(caps.decisions)
                    .cloned()
                    .collect();
                scanned.truncate(caps.commits);
                Candidates {
                    commits: scanned,
                    decisions,
                }
            }
        };
        if candidates.is_empty() {
            return None;
        }
        Some(ContextBlock::new(ContextMode::Recency, candidates, caps))
    }
}

fn log_model_failure(call: &str, err: &ModelError) {
    match err {
        ModelError::Disabled => tracing::debug!("{call} skipped: {err}"),
        _ => tracing::warn!("{call} failed: {err}"),
    }
}

/// Run the pipeline over an explicit source and index. Empty string when
/// nothing could be assembled. Panics in any stage stay on this side.
pub fn assemble_context(
    prompt: &str,
    source: &dyn LogSource,
    index: Option<&TrailerIndex>,
    settings: &ContextSettings,
    model: &dyn ModelClient,
) -> String {
    guarded(|| Ok(assemble(prompt, source, index, settings, model)))
}

/// Context for `prompt` in the repository containing `cwd`.
///
/// Never fails and never panics across this boundary: any internal error
/// yields an empty string.
pub fn retrieve_context(cwd: &Path, prompt: &str) -> String {
    guarded(|| try_retrieve(cwd, prompt))
}

/// Empty string on error or panic.
fn guarded(f: impl FnOnce() -> anyhow::Result<String>) -> String {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!("context retrieval failed: {e:#}");
            String::new()
        }
        Err(_) => {
            tracing::warn!("context retrieval panicked");
            String::new()
        }
    }
}

fn assemble(
    prompt: &str,
    source: &dyn LogSource,
    index: Option<&TrailerIndex>,
    settings: &ContextSettings,
    model: &dyn ModelClient,
) -> String {
    let scan_limit = index.is_none().then_some(settings.raw_log_limit);
    let engine = QueryEngine::new(source)
        .with_index(index)
        .with_fallback(settings.scan_fallback)
        .with_scan_limit(scan_limit);
    match Pipeline::new(&engine, settings, model).run(prompt) {
        Some(block) => block.render(settings.max_chars),
        None => String::new(),
    }
}

fn try_retrieve(cwd: &Path, prompt: &str) -> anyhow::Result<String> {
    let repo_root = GitLog::discover_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
    let paths = StorePaths::discover(&repo_root);
    let settings = ContextSettings::load(&paths.load_config());
    let source = GitLog::new(&repo_root);
    let index = trailhead_index::load(&paths.index_json, &source);
    let model = settings.model.client();
    Ok(assemble(
        prompt,
        &source,
        index.as_ref(),
        &settings,
        model.as_ref(),
    ))
}
