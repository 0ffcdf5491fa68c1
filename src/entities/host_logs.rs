use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "host_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub host_name: String,
    pub level: String,
    pub component: String,
    pub message: String,
    pub timestamp: DateTimeUtc,
    pub metadata: Option<String>,
    #[sea_orm(column_name = "type")]
    pub log_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
