use std::path::PathBuf;

use crate::parse::{get_str, parse_hook_stdin};
use crate::pipeline::retrieve_context;

// ── Hook Result ──

/// Result from a hook dispatch: JSON for the host agent on stdout, or
/// nothing. Diagnostics go through `tracing`, never through the result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HookResult {
    pub stdout: Option<String>,
}

impl HookResult {
    /// Construct a result with stdout (normal output, exit 0).
    pub fn output(stdout: String) -> Self {
        Self {
            stdout: Some(stdout),
        }
    }

    /// Construct an empty result (no output, exit 0).
    pub fn empty() -> Self {
        Self::default()
    }
}

// ── Hook dispatch ──

/// Main hook entrypoint: parse stdin, dispatch by hook_event_name.
pub fn hook_entrypoint_from_stdin(stdin: &str) -> anyhow::Result<HookResult> {
    if stdin.trim().is_empty() {
        return Ok(HookResult::empty());
    }
    let raw = parse_hook_stdin(stdin)?;
    let hook_event_name = get_str(&raw, "hook_event_name");

    match hook_event_name.as_str() {
        "UserPromptSubmit" => {
            let prompt = get_str(&raw, "prompt");
            let cwd = get_str(&raw, "cwd");
            dispatch_user_prompt(&prompt, &cwd)
        }
        _ => Ok(HookResult::empty()),
    }
}

fn dispatch_user_prompt(prompt: &str, cwd: &str) -> anyhow::Result<HookResult> {
    let cwd = if cwd.is_empty() {
        std::env::current_dir()?
    } else {
        PathBuf::from(cwd)
    };
    prompt_result(retrieve_context(&cwd, prompt))
}

fn prompt_result(context: String) -> anyhow::Result<HookResult> {
    if context.is_empty() {
        return Ok(HookResult::empty());
    }
    let output = serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": "UserPromptSubmit",
            "additionalContext": context
        }
    });
    Ok(HookResult::output(serde_json::to_string(&output)?))
}
