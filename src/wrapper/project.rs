use super::WrapperError;
use crate::api::ProjectSource;
use crate::command::{ArgumentList, CommandRunner, EnvMap};
use tracing::info;

pub const KWADMIN: &str = "kwadmin";

pub fn create_project_command(server_url: &str, project: &str) -> ArgumentList {
    let mut cmd = ArgumentList::new(KWADMIN);
    cmd.add_pair("--url", server_url)
        .add("create-project")
        .add(project);
    cmd
}

/// Creates `project` on the server unless it already exists.
///
/// Returns whether a project was created.
pub async fn ensure_project(
    source: &dyn ProjectSource,
    runner: &dyn CommandRunner,
    server_url: &str,
    project: &str,
    env: &EnvMap,
) -> Result<bool, WrapperError> {
    if server_url.trim().is_empty() {
        return Err(WrapperError::MissingServer);
    }
    if project.trim().is_empty() {
        return Err(WrapperError::MissingProject);
    }

    if source.project_exists(project).await? {
        info!("Project \"{}\" already exists on {}", project, server_url);
        return Ok(false);
    }

    info!("Creating project \"{}\" on {}", project, server_url);
    runner
        .run_checked(&create_project_command(server_url, project), env, None)
        .await?;
    Ok(true)
}
