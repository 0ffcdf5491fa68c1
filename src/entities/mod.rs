pub mod prelude {
    pub use super::groups::Entity as Groups;
    pub use super::host_groups::Entity as HostGroups;
    pub use super::host_keys::Entity as HostKeys;
    pub use super::host_logs::Entity as HostLogs;
    pub use super::hosts::Entity as Hosts;
    pub use super::inventories::Entity as Inventories;
    pub use super::sessions::Entity as Sessions;
    pub use super::user_groups::Entity as UserGroups;
    pub use super::users::Entity as Users;
}

pub mod groups;
pub mod host_groups;
pub mod host_keys;
pub mod host_logs;
pub mod hosts;
pub mod inventories;
pub mod sessions;
pub mod user_groups;
pub mod users;
