use super::{ArgumentList, CommandError, EnvMap};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

/// What a finished command left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    /// Empty when output was streamed to the console
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs vendor tools; swapped for a recording fake in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &ArgumentList,
        env: &EnvMap,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError>;

    /// Like [`run`](Self::run) but a non-zero exit becomes an error
    async fn run_checked(
        &self,
        command: &ArgumentList,
        env: &EnvMap,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        let output = self.run(command, env, cwd).await?;
        if output.success() {
            return Ok(output);
        }

        let program = command.program().unwrap_or_default().to_string();
        let status = match output.code {
            Some(code) => format!("code {}", code),
            None => "a signal".to_string(),
        };
        error!("{} exited with {}", program, status);
        Err(CommandError::Failed {
            program,
            status,
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Spawns real processes on top of the current process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    capture: bool,
}

impl ProcessRunner {
    /// Child output goes straight to this process's stdout/stderr
    pub fn streaming() -> Self {
        Self { capture: false }
    }

    /// Child output is collected into [`CommandOutput`]
    pub fn capturing() -> Self {
        Self { capture: true }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &ArgumentList,
        env: &EnvMap,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        let program = command.program().ok_or(CommandError::EmptyCommand)?;
        info!("Executing command: {}", command);

        let mut process = Command::new(program);
        process.args(command.args()).envs(env);
        if let Some(dir) = cwd {
            debug!("Working directory: {}", dir.display());
            process.current_dir(dir);
        }

        let spawn_error = |source: std::io::Error| CommandError::Spawn {
            program: program.to_string(),
            source,
        };

        let output = if self.capture {
            let output = process.output().await.map_err(spawn_error)?;
            CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        } else {
            let status = process
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(spawn_error)?;
            CommandOutput {
                code: status.code(),
                ..Default::default()
            }
        };

        debug!("{} finished with {:?}", program, output.code);
        Ok(output)
    }
}
