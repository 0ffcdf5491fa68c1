pub mod group;
pub mod host;
pub mod host_key;
pub mod host_log;
pub mod inventory;
pub mod session;
pub mod user;
