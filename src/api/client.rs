use super::{ApiError, Credentials};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Path of the web API below the server URL
pub const API_PATH: &str = "review/api";

/// A project as listed by `action=projects`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Anything that can list the server's projects
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError>;

    async fn project_exists(&self, name: &str) -> Result<bool, ApiError> {
        Ok(self.list_projects().await?.iter().any(|p| p.name == name))
    }
}

/// Client for `<url>/review/api`
#[derive(Debug)]
pub struct KlocworkApi {
    endpoint: Url,
    credentials: Credentials,
    http_client: Client,
}

impl KlocworkApi {
    pub fn new(
        server_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let endpoint = api_endpoint(server_url)?;
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Connection {
                url: endpoint.to_string(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint,
            credentials,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts one action and returns the decoded JSON records
    pub async fn send_request(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, ApiError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("user", self.credentials.user.as_str()),
            ("ltoken", self.credentials.token.as_str()),
            ("action", action),
        ];
        form.extend_from_slice(params);

        debug!("POST {} action={}", self.endpoint, action);

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Connection {
                url: self.endpoint.to_string(),
                message: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("failed to read body: {}", e),
            })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        parse_response(&body)
    }
}

#[async_trait]
impl ProjectSource for KlocworkApi {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let records = self.send_request("projects", &[]).await?;
        let projects = records
            .into_iter()
            .map(|record| {
                serde_json::from_value::<Project>(record).map_err(|e| ApiError::InvalidResponse {
                    message: format!("unexpected project record: {}", e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Server lists {} project(s)", projects.len());
        Ok(projects)
    }
}

/// Decodes an API body: one JSON value per line, or a single JSON array
pub fn parse_response(body: &str) -> Result<Vec<Value>, ApiError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<Value>>(trimmed).map_err(|e| {
            ApiError::InvalidResponse {
                message: e.to_string(),
            }
        });
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<Value>(line).map_err(|e| ApiError::InvalidResponse {
                message: format!("{} in line: {}", e, line),
            })
        })
        .collect()
}

fn api_endpoint(server_url: &str) -> Result<Url, ApiError> {
    let trimmed = server_url.trim();
    let mut base = Url::parse(trimmed).map_err(|_| ApiError::InvalidUrl(server_url.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(server_url.to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(API_PATH)
        .map_err(|_| ApiError::InvalidUrl(server_url.to_string()))
}
