pub mod config;

use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub use config::ConfigMap;

/// Env var that overrides the store root (used by tests and CI).
pub const STORE_ROOT_ENV: &str = "TRAILHEAD_HOME";

/// Compute a deterministic project ID from a repo root path.
/// project_id = blake3(normalize_path(input)) → hex string (first 32 chars).
pub fn project_id(repo_root: &Path) -> String {
    let normalized = normalize_path(repo_root);
    let hash = blake3::hash(normalized.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Normalize a path: canonicalize, lowercase on Windows, forward slashes.
fn normalize_path(p: &Path) -> String {
    let abs = p
        .canonicalize()
        .unwrap_or_else(|_| p.to_path_buf())
        .to_string_lossy()
        .to_string();
    #[cfg(windows)]
    let abs = abs.to_lowercase();
    abs.replace('\\', "/")
}

/// Return the per-user store root: `$TRAILHEAD_HOME`, else `<data_dir>/trailhead/`,
/// else `~/.trailhead/`.
pub fn store_root() -> PathBuf {
    if let Some(root) = std::env::var_os(STORE_ROOT_ENV).filter(|v| !v.is_empty()) {
        PathBuf::from(root)
    } else if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("trailhead")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".trailhead")
    } else {
        PathBuf::from(".trailhead-store")
    }
}

/// All well-known paths for one repository's project directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub repo_root: PathBuf,
    pub project_id: String,
    pub project_dir: PathBuf,
    pub index_dir: PathBuf,
    pub index_json: PathBuf,
    pub lock_file: PathBuf,
    pub config_json: PathBuf,
}

impl StorePaths {
    /// Derive all paths for `repo_root` under the current store root. No I/O
    /// beyond path canonicalization.
    pub fn discover(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let project_id = project_id(&repo_root);
        Self::under(store_root(), repo_root, project_id)
    }

    /// Same layout rooted at an explicit store directory.
    pub fn under(store: impl AsRef<Path>, repo_root: PathBuf, project_id: String) -> Self {
        let project_dir = store.as_ref().join("projects").join(&project_id);
        let index_dir = project_dir.join("index");
        Self {
            index_json: index_dir.join("trailers.json"),
            lock_file: index_dir.join("rebuild.lock"),
            config_json: project_dir.join("config.json"),
            index_dir,
            project_dir,
            project_id,
            repo_root,
        }
    }

    /// Create the project directories. Idempotent.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.index_dir)?;
        Ok(())
    }

    pub fn load_config(&self) -> ConfigMap {
        ConfigMap::load(&self.config_json)
    }
}

/// Atomic write: write to temp file in same dir, then rename.
/// Readers see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// File-based exclusive lock guard. Released on drop.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive file lock, blocking until available.
pub fn lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    let file = open_lock(path)?;
    file.lock_exclusive()?;
    Ok(LockGuard { _file: file })
}

/// Acquire an exclusive file lock without blocking.
pub fn try_lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    let file = open_lock(path)?;
    file.try_lock_exclusive()
        .map_err(|_| anyhow::anyhow!("{} is held by another process", path.display()))?;
    Ok(LockGuard { _file: file })
}

fn open_lock(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_is_deterministic() {
        let id1 = project_id(Path::new("/tmp/test-repo"));
        let id2 = project_id(Path::new("/tmp/test-repo"));
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 32);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn layout_under_explicit_root() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::under(tmp.path(), PathBuf::from("/repo"), "abc".into());
        assert_eq!(
            paths.index_json,
            tmp.path().join("projects/abc/index/trailers.json")
        );
        assert_eq!(paths.config_json, tmp.path().join("projects/abc/config.json"));
        paths.ensure_dirs().unwrap();
        assert!(paths.index_dir.is_dir());
    }

    #[test]
    fn write_atomic_replaces_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("index.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        // No temp files left behind next to the target.
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn try_lock_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("rebuild.lock");
        let guard = lock_file(&lock_path).unwrap();
        assert!(try_lock_file(&lock_path).is_err());
        drop(guard);
        assert!(try_lock_file(&lock_path).is_ok());
    }
}
