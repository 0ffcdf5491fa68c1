pub mod host;
pub mod log;

pub use host::{Host, HostReport, HostStatus};
pub use log::{HostLog, NewHostLog};
