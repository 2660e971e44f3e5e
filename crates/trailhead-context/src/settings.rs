use trailhead_model::ModelConfig;
use trailhead_query::ScanFallback;
use trailhead_store::ConfigMap;

/// Default max context chars (~1000 tokens). Overridable via
/// `TRAILHEAD_MAX_CONTEXT_CHARS` or `context.max_chars` in config.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Commits read from the log when no fresh index exists.
pub const DEFAULT_RAW_LOG_LIMIT: usize = 200;

/// Upper bound on refinement queries per prompt.
pub const MAX_FOLLOW_UPS: usize = 2;

/// Per-mode limits on listed commits and decided-against entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeCaps {
    pub commits: usize,
    pub decisions: usize,
}

#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub model_caps: ModeCaps,
    pub heuristic_caps: ModeCaps,
    pub recency_caps: ModeCaps,
    pub max_chars: usize,
    pub raw_log_limit: usize,
    pub follow_ups: usize,
    pub compress: bool,
    pub scan_fallback: ScanFallback,
    pub model: ModelConfig,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            model_caps: ModeCaps {
                commits: 6,
                decisions: 3,
            },
            heuristic_caps: ModeCaps {
                commits: 6,
                decisions: 3,
            },
            recency_caps: ModeCaps {
                commits: 10,
                decisions: 5,
            },
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
            raw_log_limit: DEFAULT_RAW_LOG_LIMIT,
            follow_ups: MAX_FOLLOW_UPS,
            compress: false,
            scan_fallback: ScanFallback::default(),
            model: ModelConfig::disabled(),
        }
    }
}

impl ContextSettings {
    /// Resolve every knob: env var, then config key, then default.
    pub fn load(cfg: &ConfigMap) -> Self {
        let d = Self::default();
        let caps = |mode: &str, env: &str, default: ModeCaps| ModeCaps {
            commits: cfg
                .usize_knob(
                    &format!("context.{mode}_commits"),
                    &format!("TRAILHEAD_{env}_COMMITS"),
                    default.commits,
                )
                .max(1),
            decisions: cfg.usize_knob(
                &format!("context.{mode}_decisions"),
                &format!("TRAILHEAD_{env}_DECISIONS"),
                default.decisions,
            ),
        };
        Self {
            model_caps: caps("model", "MODEL", d.model_caps),
            heuristic_caps: caps("heuristic", "HEURISTIC", d.heuristic_caps),
            recency_caps: caps("recency", "RECENCY", d.recency_caps),
            max_chars: cfg.usize_knob("context.max_chars", "TRAILHEAD_MAX_CONTEXT_CHARS", d.max_chars),
            raw_log_limit: cfg
                .usize_knob("context.raw_log_limit", "TRAILHEAD_RAW_LOG_LIMIT", d.raw_log_limit)
                .max(1),
            follow_ups: cfg
                .usize_knob("context.follow_ups", "TRAILHEAD_FOLLOW_UPS", d.follow_ups)
                .min(MAX_FOLLOW_UPS),
            compress: cfg.bool_knob("context.compress", "TRAILHEAD_COMPRESS", d.compress),
            scan_fallback: ScanFallback::from_config(cfg),
            model: ModelConfig::load(cfg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_caps() {
        let s = ContextSettings::default();
        assert_eq!(s.model_caps, ModeCaps { commits: 6, decisions: 3 });
        assert_eq!(s.recency_caps, ModeCaps { commits: 10, decisions: 5 });
        assert!(s.heuristic_caps.commits < s.recency_caps.commits);
        assert_eq!(s.max_chars, 4000);
        assert!(!s.model.is_enabled());
    }

    #[test]
    fn config_overrides_and_clamps() {
        let mut cfg = ConfigMap::default();
        cfg.set("context.recency_commits", "4");
        cfg.set("context.heuristic_decisions", "0");
        cfg.set("context.follow_ups", "9");
        cfg.set("context.compress", "true");
        let s = ContextSettings::load(&cfg);
        if std::env::var("TRAILHEAD_RECENCY_COMMITS").is_err() {
            assert_eq!(s.recency_caps.commits, 4);
        }
        if std::env::var("TRAILHEAD_HEURISTIC_DECISIONS").is_err() {
            assert_eq!(s.heuristic_caps.decisions, 0);
        }
        assert!(s.follow_ups <= MAX_FOLLOW_UPS);
        if std::env::var("TRAILHEAD_COMPRESS").is_err() {
            assert!(s.compress);
        }
    }
}
