use clap::Subcommand;
use std::path::Path;
use trailhead_store::{ConfigMap, StorePaths};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. context.max_chars)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// Remove a config value
    Unset {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    let paths = StorePaths::discover(repo_root);
    match cmd {
        ConfigCmd::Set { key, value } => set(&paths, &key, &value),
        ConfigCmd::Get { key } => get(&paths, &key),
        ConfigCmd::Unset { key } => unset(&paths, &key),
        ConfigCmd::List => list(&paths),
    }
}

// ── Command Implementations ──

/// `trailhead config set <key> <value>`
pub fn set(paths: &StorePaths, key: &str, value: &str) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        anyhow::bail!("config key must not be empty");
    }
    paths.ensure_dirs()?;
    let mut config = ConfigMap::load(&paths.config_json);
    config.set(key, value);
    config.save(&paths.config_json)?;
    println!("{key} = {value}");
    Ok(())
}

/// `trailhead config get <key>`
pub fn get(paths: &StorePaths, key: &str) -> anyhow::Result<()> {
    let config = ConfigMap::load(&paths.config_json);
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `trailhead config unset <key>`
pub fn unset(paths: &StorePaths, key: &str) -> anyhow::Result<()> {
    let mut config = ConfigMap::load(&paths.config_json);
    if config.remove(key).is_some() {
        config.save(&paths.config_json)?;
        println!("removed {key}");
    } else {
        println!("(not set)");
    }
    Ok(())
}

/// `trailhead config list`
pub fn list(paths: &StorePaths) -> anyhow::Result<()> {
    let config = ConfigMap::load(&paths.config_json);
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in config.iter() {
            println!("{k} = {v}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrip_through_store() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::under(tmp.path(), tmp.path().join("repo"), "p1".into());
        set(&paths, "context.max_chars", "2500").unwrap();
        set(&paths, "context.compress", "true").unwrap();
        let cfg = ConfigMap::load(&paths.config_json);
        assert_eq!(cfg.usize_knob("context.max_chars", "TRAILHEAD_TEST_UNSET_A", 0), 2500);
        assert!(cfg.bool_knob("context.compress", "TRAILHEAD_TEST_UNSET_B", false));

        unset(&paths, "context.compress").unwrap();
        let cfg = ConfigMap::load(&paths.config_json);
        assert!(cfg.get("context.compress").is_none());
    }

    #[test]
    fn empty_key_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::under(tmp.path(), tmp.path().join("repo"), "p1".into());
        assert!(set(&paths, " ", "x").is_err());
    }
}
