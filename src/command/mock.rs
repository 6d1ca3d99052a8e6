//! Recording stand-in for [`CommandRunner`]

use super::{ArgumentList, CommandError, CommandOutput, CommandRunner, EnvMap};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

pub struct RecordingRunner {
    calls: Mutex<Vec<(ArgumentList, EnvMap)>>,
    exit_code: i32,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::with_exit_code(0)
    }

    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_code,
        }
    }

    pub fn commands(&self) -> Vec<ArgumentList> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    pub fn envs(&self) -> Vec<EnvMap> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, env)| env.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        command: &ArgumentList,
        env: &EnvMap,
        _cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        if command.is_empty() {
            return Err(CommandError::EmptyCommand);
        }
        self.calls
            .lock()
            .unwrap()
            .push((command.clone(), env.clone()));
        Ok(CommandOutput {
            code: Some(self.exit_code),
            ..Default::default()
        })
    }
}
