use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Executor;
use tracing::info;

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::role::Role;

static POOL: OnceCell<MySqlPool> = OnceCell::new();

const SCHEMA: &str = include_str!("../schema.sql");

/// Builds the shared pool on first call and returns the same pool afterwards.
/// No connection is opened until the pool is first used.
pub fn pool(config: &Config) -> Result<MySqlPool> {
    let pool = POOL.get_or_try_init(|| {
        MySqlPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect_lazy(&config.database_url)
    })?;
    Ok(pool.clone())
}

/// Statements of the bootstrap schema, comments stripped.
fn schema_statements(schema: &str) -> Vec<String> {
    schema
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Creates the first admin account when nobody can log in yet.
async fn seed_admin(pool: &MySqlPool, username: &str, password: &str) -> Result<()> {
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if users > 0 {
        return Ok(());
    }

    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("hash failed: {e}"))?;
    sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed)
        .bind(Role::Admin.id())
        .execute(pool)
        .await?;

    info!(username, "Created bootstrap admin account");
    Ok(())
}

/// Connects, applies the bootstrap schema and seeds the first admin.
/// Safe to call more than once; call it at startup, not per request.
pub async fn ensure_initialized(config: &Config) -> Result<MySqlPool> {
    let pool = pool(config).context("Invalid DATABASE_URL")?;

    for stmt in schema_statements(SCHEMA) {
        pool.execute(stmt.as_str())
            .await
            .with_context(|| format!("Failed to apply schema statement: {stmt}"))?;
    }

    if let Some((username, password)) = &config.bootstrap_admin {
        seed_admin(&pool, username, password)
            .await
            .context("Failed to seed admin account")?;
    }

    info!("Database initialized");
    Ok(pool)
}
