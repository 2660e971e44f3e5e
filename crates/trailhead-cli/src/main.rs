mod cmd_config;
mod cmd_context;
mod cmd_hook;
mod cmd_index;
mod cmd_query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use trailhead_core::{Intent, QueryParams};
use tracing_subscriber::EnvFilter;

/// Env var holding the log filter directive.
const LOG_ENV: &str = "TRAILHEAD_LOG";

#[derive(Parser)]
#[command(
    name = "trailhead",
    version,
    about = "Trailer-indexed git history for coding agents"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trailer index operations
    Index {
        #[command(subcommand)]
        cmd: IndexCmd,
    },
    /// Query commits by trailer metadata
    Query {
        /// Intent filter (repeatable; matches any)
        #[arg(long = "intent", value_parser = parse_intent)]
        intents: Vec<Intent>,
        /// Scope prefix (e.g. "auth" matches "auth/session")
        #[arg(long)]
        scope: Option<String>,
        /// Session identifier
        #[arg(long)]
        session: Option<String>,
        /// Only commits recording decided-against alternatives
        #[arg(long)]
        decisions: bool,
        /// Whole-word keyword inside decided-against entries
        #[arg(long)]
        decided_against: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = trailhead_core::DEFAULT_QUERY_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the context block for a prompt (reads stdin when omitted)
    Context {
        prompt: Vec<String>,
    },
    /// Hook entrypoint (called by agent hooks)
    Hook {
        #[command(subcommand)]
        cmd: HookCmd,
    },
    /// Manage per-project config
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

#[derive(Subcommand)]
enum IndexCmd {
    /// Rebuild the trailer index from the full history
    Build,
    /// Print whether the index is fresh, stale or absent
    Status,
}

#[derive(Subcommand)]
enum HookCmd {
    /// Claude Code hook entrypoint (reads stdin JSON)
    Claude,
}

fn parse_intent(s: &str) -> Result<Intent, String> {
    Intent::parse(s).ok_or_else(|| {
        let known: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
        format!("unknown intent '{s}' (expected one of: {})", known.join(", "))
    })
}

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Repository root for the current directory, or the directory itself.
fn resolve_repo_root() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(trailhead_log::GitLog::discover_root(&cwd).unwrap_or(cwd))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let is_hook = matches!(cli.cmd, Command::Hook { .. });
    init_tracing(if is_hook { "off" } else { "warn" });

    match cli.cmd {
        Command::Hook { cmd } => match cmd {
            HookCmd::Claude => cmd_hook::hook_claude(),
        },
        Command::Index { cmd } => {
            let repo_root = resolve_repo_root()?;
            match cmd {
                IndexCmd::Build => cmd_index::build(&repo_root),
                IndexCmd::Status => cmd_index::status(&repo_root),
            }
        }
        Command::Query {
            intents,
            scope,
            session,
            decisions,
            decided_against,
            limit,
            json,
        } => {
            let params = QueryParams {
                intents,
                scope,
                session,
                decisions_only: decisions,
                decided_against,
                limit,
            }
            .with_limit(limit);
            cmd_query::execute(&resolve_repo_root()?, &params, json)
        }
        Command::Context { prompt } => cmd_context::execute(&resolve_repo_root()?, &prompt),
        Command::Config { cmd } => cmd_config::run(cmd, &resolve_repo_root()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from([
            "trailhead",
            "query",
            "--intent",
            "fix-defect",
            "--intent",
            "restructure",
            "--scope",
            "auth",
            "--limit",
            "5",
        ])
        .unwrap();
        match cli.cmd {
            Command::Query {
                intents,
                scope,
                limit,
                ..
            } => {
                assert_eq!(intents, vec![Intent::FixDefect, Intent::Restructure]);
                assert_eq!(scope.as_deref(), Some("auth"));
                assert_eq!(limit, 5);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn unknown_intent_rejected() {
        assert!(Cli::try_parse_from(["trailhead", "query", "--intent", "vibes"]).is_err());
    }
}
