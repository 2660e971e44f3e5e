//! Flat `config.json` map with dotted keys (`context.max_chars`).
//!
//! Knob resolution order everywhere: env var → config key → default.

use std::path::Path;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: Map<String, Value>,
}

impl ConfigMap {
    /// Read config from `path`. Missing or unreadable files give an empty map.
    pub fn load(path: &Path) -> Self {
        let values = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        Self { values }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.values)?;
        crate::write_atomic(path, json.as_bytes())
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Set `key` from its CLI string form (bool / integer / float / string).
    pub fn set(&mut self, key: &str, raw: &str) {
        self.values.insert(key.to_string(), parse_value(raw));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Look up a dotted key: flat entry first, then nested objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(v) = self.values.get(key) {
            return Some(v);
        }
        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn usize_knob(&self, key: &str, env: &str, default: usize) -> usize {
        env_var(env)
            .and_then(|v| v.parse().ok())
            .or_else(|| self.get(key).and_then(Value::as_u64).map(|v| v as usize))
            .unwrap_or(default)
    }

    pub fn u64_knob(&self, key: &str, env: &str, default: u64) -> u64 {
        env_var(env)
            .and_then(|v| v.parse().ok())
            .or_else(|| self.get(key).and_then(Value::as_u64))
            .unwrap_or(default)
    }

    pub fn bool_knob(&self, key: &str, env: &str, default: bool) -> bool {
        env_var(env)
            .and_then(|v| parse_bool(&v))
            .or_else(|| self.get(key).and_then(Value::as_bool))
            .unwrap_or(default)
    }

    pub fn string_knob(&self, key: &str, env: &str) -> Option<String> {
        env_var(env).or_else(|| {
            self.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}
