use std::path::Path;

use trailhead_core::QueryParams;
use trailhead_log::{GitLog, LogSource};
use trailhead_query::{format_human, QueryEngine, ScanFallback};
use trailhead_store::StorePaths;

/// `trailhead query [filters]`: index when fresh, full log scan otherwise.
pub fn execute(repo_root: &Path, params: &QueryParams, json: bool) -> anyhow::Result<()> {
    let paths = StorePaths::discover(repo_root);
    let config = paths.load_config();
    let source = GitLog::new(repo_root);
    if source.head().is_none() {
        anyhow::bail!("{} is not a git repository with commits", repo_root.display());
    }
    let index = trailhead_index::load(&paths.index_json, &source);
    let engine = QueryEngine::new(&source)
        .with_index(index.as_ref())
        .with_fallback(ScanFallback::from_config(&config));

    let results = engine.query(params);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", format_human(&results));
    }
    Ok(())
}
