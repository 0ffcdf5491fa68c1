//! Domain primitives shared by the auth layer and the host registry.

pub mod principal;
pub mod sets;

pub use principal::{Credential, Operation, Principal, Role, UserPrincipal, split_bearer};
pub use sets::{
    COMPONENT_DELIMITER, GROUP_DELIMITER, NIL, groups_match, join_set, split_components,
    split_groups, split_set,
};
