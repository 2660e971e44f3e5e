// ── Hook stdin parsing ──

/// Parse the stdin JSON from the Claude Code hook.
pub(crate) fn parse_hook_stdin(stdin: &str) -> anyhow::Result<serde_json::Value> {
    let val: serde_json::Value = serde_json::from_str(stdin)?;
    Ok(val)
}

/// Get a string field from JSON, trying snake_case first then camelCase.
/// Claude Code sends snake_case today; older builds sent camelCase.
pub(crate) fn get_str(v: &serde_json::Value, snake_key: &str) -> String {
    if let Some(s) = v.get(snake_key).and_then(|x| x.as_str()) {
        return s.to_string();
    }
    let camel = snake_to_camel(snake_key);
    v.get(&camel)
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string()
}

pub(crate) fn snake_to_camel(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_to_camel_converts_correctly() {
        assert_eq!(snake_to_camel("hook_event_name"), "hookEventName");
        assert_eq!(snake_to_camel("cwd"), "cwd");
    }

    #[test]
    fn get_str_accepts_both_casings() {
        let v = parse_hook_stdin(r#"{"hook_event_name":"A","hookEventName":"B","sessionId":"s"}"#)
            .unwrap();
        assert_eq!(get_str(&v, "hook_event_name"), "A");
        assert_eq!(get_str(&v, "session_id"), "s");
        assert_eq!(get_str(&v, "prompt"), "");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_hook_stdin("not json").is_err());
    }
}
