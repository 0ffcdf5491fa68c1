pub mod awx;
pub mod oidc;
