use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use std::collections::HashMap;

use crate::entities::{groups, host_groups, prelude::*, user_groups};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i32,
    pub name: String,
}

impl From<groups::Model> for Group {
    fn from(model: groups::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

pub struct GroupRepository {
    conn: DatabaseConnection,
}

impl GroupRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Group>> {
        let rows = Groups::find()
            .order_by_asc(groups::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list groups")?;

        Ok(rows.into_iter().map(Group::from).collect())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Group>> {
        let row = Groups::find()
            .filter(groups::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query group")?;

        Ok(row.map(Group::from))
    }

    pub async fn create(&self, name: &str) -> Result<Group> {
        let model = groups::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .with_context(|| format!("Failed to create group {name}"))?;

        Ok(Group::from(model))
    }

    /// Removes the group and its memberships. Returns the ids of hosts and
    /// users whose projections must be recomputed.
    pub async fn delete(&self, group_id: i32) -> Result<(Vec<i32>, Vec<i32>)> {
        let host_ids = self.host_ids_in(group_id).await?;
        let user_ids = self.user_ids_in(group_id).await?;

        HostGroups::delete_many()
            .filter(host_groups::Column::GroupId.eq(group_id))
            .exec(&self.conn)
            .await?;
        UserGroups::delete_many()
            .filter(user_groups::Column::GroupId.eq(group_id))
            .exec(&self.conn)
            .await?;
        Groups::delete_by_id(group_id)
            .exec(&self.conn)
            .await
            .context("Failed to delete group")?;

        Ok((host_ids, user_ids))
    }

    async fn host_ids_in(&self, group_id: i32) -> Result<Vec<i32>> {
        let rows = HostGroups::find()
            .filter(host_groups::Column::GroupId.eq(group_id))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|row| row.host_id).collect())
    }

    async fn user_ids_in(&self, group_id: i32) -> Result<Vec<i32>> {
        let rows = UserGroups::find()
            .filter(user_groups::Column::GroupId.eq(group_id))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }

    pub async fn add_host(&self, group_id: i32, host_id: i32) -> Result<()> {
        HostGroups::insert(host_groups::ActiveModel {
            host_id: Set(host_id),
            group_id: Set(group_id),
        })
        .on_conflict(
            OnConflict::columns([host_groups::Column::HostId, host_groups::Column::GroupId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await
        .context("Failed to link host to group")?;
        Ok(())
    }

    pub async fn remove_host(&self, group_id: i32, host_id: i32) -> Result<bool> {
        let result = HostGroups::delete_many()
            .filter(host_groups::Column::GroupId.eq(group_id))
            .filter(host_groups::Column::HostId.eq(host_id))
            .exec(&self.conn)
            .await
            .context("Failed to unlink host from group")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn add_user(&self, group_id: i32, user_id: i32) -> Result<()> {
        UserGroups::insert(user_groups::ActiveModel {
            user_id: Set(user_id),
            group_id: Set(group_id),
        })
        .on_conflict(
            OnConflict::columns([user_groups::Column::UserId, user_groups::Column::GroupId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await
        .context("Failed to link user to group")?;
        Ok(())
    }

    pub async fn remove_user(&self, group_id: i32, user_id: i32) -> Result<bool> {
        let result = UserGroups::delete_many()
            .filter(user_groups::Column::GroupId.eq(group_id))
            .filter(user_groups::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to unlink user from group")?;
        Ok(result.rows_affected > 0)
    }

    /// Group names per host id, from the association table.
    pub async fn names_by_host(&self) -> Result<HashMap<i32, Vec<String>>> {
        let links = HostGroups::find()
            .find_also_related(Groups)
            .all(&self.conn)
            .await
            .context("Failed to load host group links")?;

        let mut map: HashMap<i32, Vec<String>> = HashMap::new();
        for (link, group) in links {
            if let Some(group) = group {
                map.entry(link.host_id).or_default().push(group.name);
            }
        }
        Ok(map)
    }

    pub async fn names_for_user(&self, user_id: i32) -> Result<Vec<String>> {
        let links = UserGroups::find()
            .filter(user_groups::Column::UserId.eq(user_id))
            .find_also_related(Groups)
            .all(&self.conn)
            .await
            .context("Failed to load user group links")?;

        Ok(links
            .into_iter()
            .filter_map(|(_, group)| group.map(|g| g.name))
            .collect())
    }
}
