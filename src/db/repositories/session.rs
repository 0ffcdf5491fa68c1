use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::user::generate_token;
use crate::entities::sessions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: i32,
    pub token: String,
    pub timeout: DateTime<Utc>,
    pub user_id: i32,
}

impl From<sessions::Model> for Session {
    fn from(model: sessions::Model) -> Self {
        Self {
            id: model.id,
            token: model.token,
            timeout: model.timeout,
            user_id: model.user_id,
        }
    }
}

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user_id: i32, timeout: DateTime<Utc>) -> Result<Session> {
        let active = sessions::ActiveModel {
            token: Set(generate_token()),
            timeout: Set(timeout),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert session")?;

        Ok(Session::from(model))
    }

    /// First session whose token equals any of the candidates, in candidate
    /// order.
    pub async fn find_by_tokens(&self, candidates: &[&str]) -> Result<Option<Session>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let rows = sessions::Entity::find()
            .filter(sessions::Column::Token.is_in(candidates.iter().copied()))
            .order_by_asc(sessions::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query sessions by token")?;

        Ok(candidates
            .iter()
            .find_map(|candidate| rows.iter().find(|row| row.token == *candidate))
            .cloned()
            .map(Session::from))
    }

    /// Pushes the expiry forward to `new_timeout`.
    ///
    /// The update only touches rows that are still live at `now` and whose
    /// timeout is below the new value, so an expired session is never
    /// revived and a concurrent, later extension is never rolled back.
    /// Returns the effective timeout, or `None` if the session is gone or
    /// expired.
    pub async fn extend(
        &self,
        token: &str,
        now: DateTime<Utc>,
        new_timeout: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let result = sessions::Entity::update_many()
            .col_expr(
                sessions::Column::Timeout,
                sea_orm::sea_query::Expr::value(new_timeout),
            )
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::Timeout.gt(now))
            .filter(sessions::Column::Timeout.lt(new_timeout))
            .exec(&self.conn)
            .await
            .context("Failed to extend session")?;

        if result.rows_affected > 0 {
            return Ok(Some(new_timeout));
        }

        let current = sessions::Entity::find()
            .filter(sessions::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to re-read session")?;

        Ok(current
            .map(|row| row.timeout)
            .filter(|timeout| *timeout > now))
    }

    /// Deletes the session only if it is still expired at `now`.
    pub async fn delete_if_expired(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::Timeout.lte(now))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired session")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete(&self, token: &str) -> Result<bool> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to delete session")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete user sessions")?;

        Ok(result.rows_affected)
    }
}
