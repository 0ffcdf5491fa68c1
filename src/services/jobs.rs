//! Remote job execution, scoped by the access filter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::{Operation, Principal};
use crate::services::host_registry::{HostRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job execution is not configured")]
    Disabled,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Job runner error: {0}")]
    External(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub template_id: i64,
    pub host: String,
    #[serde(default)]
    pub extra_vars: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLaunch {
    pub job_id: i64,
    pub status: String,
}

/// Launches a job template against a single host.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn launch(
        &self,
        template_id: i64,
        host_name: &str,
        extra_vars: Option<serde_json::Value>,
    ) -> Result<JobLaunch, JobError>;
}

pub struct JobService {
    runner: Option<Arc<dyn JobRunner>>,
    registry: Arc<HostRegistry>,
}

impl JobService {
    #[must_use]
    pub fn new(runner: Option<Arc<dyn JobRunner>>, registry: Arc<HostRegistry>) -> Self {
        Self { runner, registry }
    }

    pub async fn run(&self, principal: &Principal, request: JobRequest) -> Result<JobLaunch, JobError> {
        let Some(runner) = &self.runner else {
            return Err(JobError::Disabled);
        };

        let host = self
            .registry
            .authorize(principal, &request.host, Operation::RunJob)
            .await?;

        let launch = runner
            .launch(request.template_id, &host.name, request.extra_vars)
            .await?;
        info!(
            host = %host.name,
            template_id = request.template_id,
            job_id = launch.job_id,
            principal = %principal.label(),
            "Job launched"
        );
        Ok(launch)
    }
}
