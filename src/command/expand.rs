use super::EnvMap;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn variable_regex() -> &'static Regex {
    static VARIABLE: OnceLock<Regex> = OnceLock::new();
    VARIABLE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("Invalid variable regex")
    })
}

/// Replaces `$VAR` and `${VAR}` with values from `env`; unknown names stay as written
pub fn expand_env(input: &str, env: &EnvMap) -> String {
    variable_regex()
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
