use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::AwxConfig;
use crate::services::jobs::{JobError, JobLaunch, JobRunner};

#[derive(Debug, Serialize)]
struct LaunchRequest<'a> {
    limit: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_vars: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    #[serde(alias = "job")]
    id: i64,
    #[serde(default)]
    status: String,
}

/// Launches AWX job templates limited to a single host.
#[derive(Clone)]
pub struct AwxClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl AwxClient {
    pub fn new(config: &AwxConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent("fleetd/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.url)?,
            token: config.token.clone(),
        })
    }

    fn launch_url(&self, template_id: i64) -> Result<Url, JobError> {
        self.base_url
            .join(&format!("api/v2/job_templates/{template_id}/launch/"))
            .map_err(|e| JobError::External(e.to_string()))
    }
}

#[async_trait]
impl JobRunner for AwxClient {
    async fn launch(
        &self,
        template_id: i64,
        host_name: &str,
        extra_vars: Option<serde_json::Value>,
    ) -> Result<JobLaunch, JobError> {
        let url = self.launch_url(template_id)?;
        debug!(%url, host = %host_name, "Launching AWX job");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&LaunchRequest {
                limit: host_name,
                extra_vars,
            })
            .send()
            .await
            .map_err(|e| JobError::External(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::External(format!("AWX returned {status}: {body}")));
        }

        let launched: LaunchResponse = response
            .json()
            .await
            .map_err(|e| JobError::External(e.to_string()))?;

        Ok(JobLaunch {
            job_id: launched.id,
            status: if launched.status.is_empty() {
                "pending".to_string()
            } else {
                launched.status
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_url_is_joined_under_base() {
        let config = AwxConfig {
            enabled: true,
            url: "https://awx.example.com/".to_string(),
            token: "t".to_string(),
            request_timeout_seconds: 5,
        };
        let client = AwxClient::new(&config).unwrap();
        assert_eq!(
            client.launch_url(12).unwrap().as_str(),
            "https://awx.example.com/api/v2/job_templates/12/launch/"
        );
    }
}
