use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

// The user directory belongs to the main platform; this service only reads
// the mirrored platform_user table for two things: resolving an optional
// owning user on booking, and enumerating active admins for alerts.

pub const ROLE_USER: i16 = 0;
pub const ROLE_ADMIN: i16 = 1;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserBrief {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: i16,
}

pub async fn lookup_user(db: &PgPool, user_id: Uuid) -> Result<Option<UserBrief>, ApiError> {
    sqlx::query_as::<_, UserBrief>(
        r#"
        SELECT user_id, full_name, email, role
        FROM platform_user
        WHERE user_id = $1
          AND is_active = true
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
    .map_err(ApiError::db)
}

pub async fn active_admins(db: &PgPool) -> Result<Vec<UserBrief>, ApiError> {
    sqlx::query_as::<_, UserBrief>(
        r#"
        SELECT user_id, full_name, email, role
        FROM platform_user
        WHERE role = $1
          AND is_active = true
        "#,
    )
    .bind(ROLE_ADMIN)
    .fetch_all(db)
    .await
    .map_err(ApiError::db)
}
