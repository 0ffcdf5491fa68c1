pub mod access;
pub use access::{AccessDenied, InventorySummary, Scope};

pub mod auth_service;
pub use auth_service::{AuthError, AuthService, UnauthenticatedReason};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod principal;
pub use principal::{ExternalIdentity, IdentityError, IdentityProvider, PrincipalResolver};

pub mod host_registry;
pub use host_registry::{HostConfig, HostRegistry, RegistrationOutcome, RegistryError};

pub mod log_retention;
pub use log_retention::{LogError, LogPage, LogRetentionManager};

pub mod fleet_service;
pub use fleet_service::{FleetError, FleetService, GroupSummary};

pub mod jobs;
pub use jobs::{JobError, JobLaunch, JobRequest, JobRunner, JobService};
