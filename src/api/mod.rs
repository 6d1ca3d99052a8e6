//! Klocwork web API access
//!
//! The server exposes a single form-encoded endpoint, `<url>/review/api`, that
//! takes the caller's user name and ltoken plus an `action`. Authentication
//! data comes from the ltoken file written by `kwauth`.

mod client;
mod ltoken;

pub use client::{parse_response, KlocworkApi, Project, ProjectSource, API_PATH};
pub use ltoken::{
    default_ltoken_path, parse_ltoken, resolve_ltoken_path, select_entry, Credentials, LtokenEntry,
    LtokenError, LTOKEN_ENV, LTOKEN_HASH_INDEX, LTOKEN_USER_INDEX,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to connect to the Klocwork web API at {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Klocwork web API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from the Klocwork web API: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid server URL \"{0}\"")]
    InvalidUrl(String),

    #[error(transparent)]
    Ltoken(#[from] LtokenError),
}
