//! Job environment setup for Klocwork builds
//!
//! Exports the `KLOCWORK_*` variables the vendor tools and the rest of this
//! crate read, puts the selected install's tools on `PATH`, and optionally
//! creates the server project before the build starts.

mod environment;
mod project;

pub use environment::{path_separator, BuildEnvironment, EnvironmentSetup};
pub use project::{create_project_command, ensure_project, KWADMIN};

use crate::api::ApiError;
use crate::command::CommandError;
use thiserror::Error;

pub const KLOCWORK_URL: &str = "KLOCWORK_URL";
pub const KLOCWORK_LICENSE_HOST: &str = "KLOCWORK_LICENSE_HOST";
pub const KLOCWORK_LICENSE_PORT: &str = "KLOCWORK_LICENSE_PORT";
pub const KLOCWORK_PROJECT: &str = "KLOCWORK_PROJECT";
pub const KLOCWORK_LTOKEN: &str = crate::api::LTOKEN_ENV;
pub const PATH_ENV: &str = "PATH";

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("Creating a project needs a server with a URL")]
    MissingServer,

    #[error("Creating a project needs a project name")]
    MissingProject,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Command(#[from] CommandError),
}
