use std::path::Path;

use trailhead_index::Freshness;
use trailhead_log::GitLog;
use trailhead_store::StorePaths;

/// `trailhead index build`
pub fn build(repo_root: &Path) -> anyhow::Result<()> {
    let paths = StorePaths::discover(repo_root);
    let source = GitLog::new(repo_root);
    let index = trailhead_index::rebuild(&paths, &source)?;
    println!(
        "Indexed {} commits at {} ({} intents, {} scopes, {} with decided-against)",
        index.commit_count,
        trailhead_core::short_hash(&index.head_commit),
        index.by_intent.len(),
        index.by_scope.len(),
        index.with_decided_against.len(),
    );
    println!("  {}", paths.index_json.display());
    Ok(())
}

/// `trailhead index status`
pub fn status(repo_root: &Path) -> anyhow::Result<()> {
    let paths = StorePaths::discover(repo_root);
    let source = GitLog::new(repo_root);
    match trailhead_index::check_freshness(&paths.index_json, &source) {
        Freshness::Fresh => println!("fresh"),
        Freshness::Stale { indexed, current } => {
            let current = current.as_deref().map_or("unknown", trailhead_core::short_hash);
            println!(
                "stale (indexed {}, HEAD {current})",
                trailhead_core::short_hash(&indexed)
            );
        }
        Freshness::Absent => println!("absent"),
    }
    Ok(())
}
