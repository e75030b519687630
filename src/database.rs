//! Database bootstrap: create the target database if missing, then open the pool.

use crate::error::{AppError, ConfigError};
use crate::server_config::ServerConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

const ADMIN_DATABASE: &str = "postgres";

/// Connect to the `postgres` maintenance database and create the database named in `database_url`.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == ADMIN_DATABASE {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url).map_err(|e| invalid_url(e.to_string()))?;
    let mut conn = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

pub async fn connect(config: &ServerConfig) -> Result<PgPool, AppError> {
    let opts = PgConnectOptions::from_str(&config.database_url).map_err(|e| invalid_url(e.to_string()))?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_with(opts)
        .await?;
    Ok(pool)
}

/// Round trip used by the readiness probe.
pub async fn ping(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

fn invalid_url(message: String) -> AppError {
    ConfigError::Env {
        name: "DATABASE_URL",
        message,
    }
    .into()
}

/// `(admin_url, database_name)`. The query string is carried over to the admin URL.
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let (without_query, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };
    let scheme_end = without_query.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = without_query
        .get(scheme_end..)
        .and_then(|rest| rest.find('/'))
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| invalid_url("no database path".into()))?;
    let db_name = without_query.get(path_start..).unwrap_or("").trim().to_string();
    let mut admin_url = format!("{}{}", &without_query[..path_start], ADMIN_DATABASE);
    if let Some(query) = query {
        admin_url.push('?');
        admin_url.push_str(query);
    }
    Ok((admin_url, db_name))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
