use sea_orm::entity::prelude::*;

/// `name` carries no unique constraint at the table level. The unique index
/// is created at startup once duplicate names have been repaired.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hosts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub ip_address: String,

    pub cpu_cores: i32,

    pub ram: String,

    pub os: String,

    pub monokit_version: String,

    /// `::`-delimited component names, `nil` when empty.
    pub disabled_components: String,

    pub installed_components: String,

    pub status: String,

    /// Comma-joined projection of `host_groups`, `nil` when empty.
    pub groups: String,

    pub inventory: String,

    pub up_for_deletion: bool,

    pub wants_update_to: String,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::host_groups::Entity")]
    HostGroups,
}

impl Related<super::host_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HostGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
