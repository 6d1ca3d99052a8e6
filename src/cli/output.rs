//! Output formatting for multiple formats
//!
//! Everything printed to stdout goes through [`OutputFormatter`] so CI scripts
//! can pick shell `export` lines, JSON, YAML or plain text.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::api::Project;
use crate::config::KwciConfig;
use crate::sync::{LastSyncType, SyncCutoff};
use crate::wrapper::BuildEnvironment;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// POSIX shell assignments, ready for `eval`
    Shell,
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

#[derive(Serialize)]
struct CutoffReport<'a> {
    mode: LastSyncType,
    #[serde(flatten)]
    cutoff: &'a SyncCutoff,
    argument: &'a str,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_environment(&self, env: &BuildEnvironment) -> Result<String> {
        match self.format {
            OutputFormat::Shell => Ok(env
                .vars()
                .iter()
                .map(|(k, v)| format!("export {}={}\n", k, shell_quote(v)))
                .collect()),
            OutputFormat::Json => serde_json::to_string_pretty(&env_map(env))
                .context("Failed to serialize environment to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&env_map(env))
                .context("Failed to serialize environment to YAML"),
            OutputFormat::Human => {
                let mut output = String::from("Klocwork environment:\n");
                if env.is_empty() {
                    output.push_str("  (nothing to set)\n");
                }
                for (key, value) in env.vars() {
                    let _ = writeln!(output, "  {} = {}", key, value);
                }
                Ok(output)
            }
        }
    }

    pub fn format_cutoff(&self, mode: LastSyncType, cutoff: &SyncCutoff) -> Result<String> {
        let report = CutoffReport {
            mode,
            cutoff,
            argument: cutoff.as_arg(),
        };
        match self.format {
            OutputFormat::Shell => Ok(format!("KWCI_LAST_SYNC={}\n", shell_quote(cutoff.as_arg()))),
            OutputFormat::Json => {
                serde_json::to_string_pretty(&report).context("Failed to serialize cutoff to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(&report).context("Failed to serialize cutoff to YAML")
            }
            OutputFormat::Human => Ok(format!("{}\n", cutoff.as_arg())),
        }
    }

    pub fn format_projects(&self, projects: &[Project]) -> Result<String> {
        match self.format {
            OutputFormat::Shell => {
                let names: Vec<String> = projects.iter().map(|p| shell_quote(&p.name)).collect();
                Ok(format!("{}\n", names.join(" ")))
            }
            OutputFormat::Json => serde_json::to_string_pretty(projects)
                .context("Failed to serialize projects to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(projects).context("Failed to serialize projects to YAML")
            }
            OutputFormat::Human => {
                let mut output = String::new();
                for project in projects {
                    match &project.description {
                        Some(description) if !description.is_empty() => {
                            let _ = writeln!(output, "{}  ({})", project.name, description);
                        }
                        _ => {
                            let _ = writeln!(output, "{}", project.name);
                        }
                    }
                }
                Ok(output)
            }
        }
    }

    pub fn format_config(&self, config: &KwciConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON"),
            OutputFormat::Yaml | OutputFormat::Shell => {
                serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")
            }
            OutputFormat::Human => Ok(config.to_string()),
        }
    }
}

fn env_map(env: &BuildEnvironment) -> BTreeMap<&str, &str> {
    env.vars()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// Single-quotes `value` unless it only holds characters the shell leaves alone
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@%+=,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
