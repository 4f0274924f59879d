//! Environment-variable interpolation over the raw document tree.
//!
//! `${VAR}` requires the variable to be set; `${VAR:=default}` falls back to
//! the default. The `mcp_servers[*].env` subtree is preserved verbatim so MCP
//! servers can do their own interpolation.

use regex::Regex;
use serde_yaml::Value;
use std::sync::OnceLock;

use crate::error::{ConfigError, ConfigResult};

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::=([^}]*))?\}")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Interpolate environment variables through a parsed YAML tree in place.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnvVar`] when `${VAR}` names an unset
/// variable and no default is given.
pub fn interpolate_env(value: &mut Value) -> ConfigResult<()> {
    let mut path = Vec::new();
    walk(value, &mut path)
}

fn walk(value: &mut Value, path: &mut Vec<String>) -> ConfigResult<()> {
    match value {
        Value::String(s) => {
            if !inside_mcp_env(path) {
                *s = interpolate_str(s, &path.join("."))?;
            }
            Ok(())
        }
        Value::Sequence(seq) => {
            for (i, item) in seq.iter_mut().enumerate() {
                path.push(i.to_string());
                walk(item, path)?;
                path.pop();
            }
            Ok(())
        }
        Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                let segment = key.as_str().map_or_else(
                    || serde_yaml::to_string(key).unwrap_or_default().trim().to_string(),
                    ToString::to_string,
                );
                path.push(segment);
                walk(item, path)?;
                path.pop();
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// A value sits inside `mcp_servers[*].env` when the path ends
/// `... mcp_servers <index> env <key> ...`.
fn inside_mcp_env(path: &[String]) -> bool {
    path.windows(3)
        .any(|w| w[0] == "mcp_servers" && w[2] == "env")
}

fn interpolate_str(input: &str, path: &str) -> ConfigResult<String> {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for caps in pattern().captures_iter(input) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let start = caps.get(0).map_or(0, |m| m.start());
        result.push_str(&input[last..start]);
        last = start.saturating_add(whole.len());

        let var = caps.get(1).map_or("", |m| m.as_str());
        let default = caps.get(2).map(|m| m.as_str());

        match std::env::var(var) {
            Ok(value) => result.push_str(&value),
            Err(_) => match default {
                Some(d) => result.push_str(d),
                None => {
                    return Err(ConfigError::MissingEnvVar {
                        var: var.to_string(),
                        path: path.to_string(),
                    })
                }
            },
        }
    }

    result.push_str(&input[last..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_simple_interpolation() {
        std::env::set_var("APIARY_TEST_MODEL", "gpt-5");
        let mut value = parse("model: ${APIARY_TEST_MODEL}");
        interpolate_env(&mut value).unwrap();
        assert_eq!(value["model"], Value::String("gpt-5".into()));
    }

    #[test]
    fn test_default_fallback() {
        std::env::remove_var("APIARY_TEST_UNSET");
        let mut value = parse("dir: ${APIARY_TEST_UNSET:=/tmp/work}");
        interpolate_env(&mut value).unwrap();
        assert_eq!(value["dir"], Value::String("/tmp/work".into()));
    }

    #[test]
    fn test_missing_var_errors_with_path() {
        std::env::remove_var("APIARY_TEST_ABSENT");
        let mut value = parse("swarm:\n  name: ${APIARY_TEST_ABSENT}");
        let err = interpolate_env(&mut value).unwrap_err();
        match err {
            ConfigError::MissingEnvVar { var, path } => {
                assert_eq!(var, "APIARY_TEST_ABSENT");
                assert_eq!(path, "swarm.name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mcp_env_subtree_is_preserved() {
        std::env::set_var("APIARY_TEST_TOKEN", "visible");
        let mut value = parse(
            "agents:\n  a:\n    headers:\n      auth: ${APIARY_TEST_TOKEN}\n    mcp_servers:\n      - name: m\n        env:\n          TOKEN: ${APIARY_TEST_TOKEN}\n",
        );
        interpolate_env(&mut value).unwrap();

        assert_eq!(
            value["agents"]["a"]["headers"]["auth"],
            Value::String("visible".into())
        );
        // Verbatim inside mcp_servers env.
        assert_eq!(
            value["agents"]["a"]["mcp_servers"][0]["env"]["TOKEN"],
            Value::String("${APIARY_TEST_TOKEN}".into())
        );
    }

    #[test]
    fn test_multiple_occurrences_in_one_string() {
        std::env::set_var("APIARY_TEST_A", "x");
        std::env::set_var("APIARY_TEST_B", "y");
        let mut value = parse("combo: ${APIARY_TEST_A}-${APIARY_TEST_B}");
        interpolate_env(&mut value).unwrap();
        assert_eq!(value["combo"], Value::String("x-y".into()));
    }
}
