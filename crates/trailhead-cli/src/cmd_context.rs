use std::io::Read;
use std::path::Path;

/// `trailhead context <prompt...>`: prints the block the hook would inject.
pub fn execute(repo_root: &Path, words: &[String]) -> anyhow::Result<()> {
    let prompt = if words.is_empty() {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        words.join(" ")
    };

    let block = trailhead_context::retrieve_context(repo_root, &prompt);
    if block.is_empty() {
        eprintln!("(no context)");
    } else {
        println!("{block}");
    }
    Ok(())
}
