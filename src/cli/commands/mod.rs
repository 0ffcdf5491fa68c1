mod admin;
mod hosts;
mod repair;

pub use admin::cmd_create_admin;
pub use hosts::cmd_list_hosts;
pub use repair::cmd_repair_duplicates;
