// Ops helper: mint a session token for an existing platform user, e.g. to
// give an admin API access without going through the platform login flow.
//
//   mktoken <user_id> [ttl_hours]
//
// ttl_hours falls back to SESSION_TTL_HOURS, then 24.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let user_id: Uuid = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Usage: mktoken <user_id> [ttl_hours]"))?
        .parse()?;
    let ttl_hours: i64 = match std::env::args().nth(2) {
        Some(s) => s.parse()?,
        None => default_ttl_hours(std::env::var("SESSION_TTL_HOURS").ok()),
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let token_hash = hex::encode(hasher.finalize());

    sqlx::query(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, expires_at)
        VALUES ($1, $2, now() + make_interval(hours => $3::int))
        "#,
    )
    .bind(user_id)
    .bind(&token_hash)
    .bind(ttl_hours as i32)
    .execute(&pool)
    .await?;

    println!("{token}");
    Ok(())
}

fn default_ttl_hours(env_value: Option<String>) -> i64 {
    env_value.and_then(|s| s.parse::<i64>().ok()).unwrap_or(24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_hours() {
        assert_eq!(default_ttl_hours(None), 24);
        assert_eq!(default_ttl_hours(Some("48".into())), 48);
        assert_eq!(default_ttl_hours(Some("not a number".into())), 24);
    }
}
