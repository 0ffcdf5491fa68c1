use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::entities::{inventories, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub id: i32,
    pub name: String,
}

impl From<inventories::Model> for Inventory {
    fn from(model: inventories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

pub struct InventoryRepository {
    conn: DatabaseConnection,
}

impl InventoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Inventory>> {
        let rows = Inventories::find()
            .order_by_asc(inventories::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list inventories")?;

        Ok(rows.into_iter().map(Inventory::from).collect())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Inventory>> {
        let row = Inventories::find()
            .filter(inventories::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query inventory")?;

        Ok(row.map(Inventory::from))
    }

    pub async fn create(&self, name: &str) -> Result<Inventory> {
        let model = inventories::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .with_context(|| format!("Failed to create inventory {name}"))?;

        Ok(Inventory::from(model))
    }

    /// Creates the inventory if it does not exist yet.
    pub async fn ensure(&self, name: &str) -> Result<()> {
        Inventories::insert(inventories::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(inventories::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await
        .with_context(|| format!("Failed to ensure inventory {name}"))?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<bool> {
        let result = Inventories::delete_many()
            .filter(inventories::Column::Name.eq(name))
            .exec(&self.conn)
            .await
            .context("Failed to delete inventory")?;
        Ok(result.rows_affected > 0)
    }
}
