use super::{
    KLOCWORK_LICENSE_HOST, KLOCWORK_LICENSE_PORT, KLOCWORK_LTOKEN, KLOCWORK_PROJECT, KLOCWORK_URL,
    PATH_ENV,
};
use crate::command::{expand_env, EnvMap};
use crate::config::{InstallConfig, LicenseConfig, ServerConfig};
use serde::Serialize;
use tracing::{info, warn};

/// `PATH` entry separator of the host running the build
pub fn path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

/// Variables to export, in the order they were decided
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildEnvironment {
    vars: Vec<(String, String)>,
}

impl BuildEnvironment {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.vars.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// `base` with these variables applied on top, for child processes
    pub fn merged_with(&self, base: &EnvMap) -> EnvMap {
        let mut merged = base.clone();
        merged.extend(self.vars.iter().cloned());
        merged
    }
}

/// Inputs of the environment setup for one job
#[derive(Debug, Clone)]
pub struct EnvironmentSetup<'a> {
    pub server: Option<&'a ServerConfig>,
    pub install: Option<&'a InstallConfig>,
    pub global_license: &'a LicenseConfig,
    pub project: Option<&'a str>,
    pub ltoken: Option<&'a str>,
    pub path_separator: &'a str,
}

impl<'a> EnvironmentSetup<'a> {
    pub fn new(global_license: &'a LicenseConfig) -> Self {
        Self {
            server: None,
            install: None,
            global_license,
            project: None,
            ltoken: None,
            path_separator: path_separator(),
        }
    }

    /// Decides the job's variables; `initial` is the environment the job started with
    pub fn apply(&self, initial: &EnvMap) -> BuildEnvironment {
        info!("Setting up environment variables for Klocwork jobs...");
        let mut env = BuildEnvironment::default();

        let license = match self.server {
            Some(server) => {
                if server.url.trim().is_empty() {
                    warn!("Server URL for configuration \"{}\" is empty", server.name);
                } else {
                    info!("Adding the Klocwork Server URL {}", server.url);
                    env.set(KLOCWORK_URL, server.url.as_str());
                }

                match &server.license {
                    Some(license) => {
                        info!("Using specific License for given server {}", license);
                        license
                    }
                    None => {
                        info!("Using Global License Settings {}", self.global_license);
                        self.global_license
                    }
                }
            }
            None => {
                warn!(
                    "No Klocwork server selected. Klocwork cannot perform server builds or \
                     synchronisations without a server."
                );
                info!("Using Global License Settings {}", self.global_license);
                self.global_license
            }
        };
        env.set(KLOCWORK_LICENSE_HOST, license.host.as_str());
        env.set(KLOCWORK_LICENSE_PORT, license.port.as_str());

        match self.project.filter(|p| !p.trim().is_empty()) {
            Some(project) => env.set(KLOCWORK_PROJECT, project),
            None => warn!(
                "No Klocwork project provided. Klocwork cannot perform server builds or \
                 synchronisations without a project."
            ),
        }

        if let Some(install) = self.install {
            info!("Adding Klocwork paths. Using install \"{}\"", install.name);
            let mut path = install.paths.join(self.path_separator);
            path.push_str(self.path_separator);
            if let Some(initial_path) = initial.get(PATH_ENV) {
                path.push_str(initial_path);
            }
            env.set(PATH_ENV, path);
        }

        match self.ltoken.filter(|l| !l.trim().is_empty()) {
            Some(ltoken) => {
                let expanded = expand_env(ltoken, initial);
                info!("Detected ltoken file. Setting {} to \"{}\"", KLOCWORK_LTOKEN, expanded);
                env.set(KLOCWORK_LTOKEN, expanded);
            }
            None => info!("No ltoken file specified. {} will not be set.", KLOCWORK_LTOKEN),
        }

        env
    }
}
