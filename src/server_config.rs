//! Server settings from the environment.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Allowed CORS origins. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Directory with an alternative catalog; the embedded one when unset.
    pub catalog_dir: Option<PathBuf>,
    pub api_base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: String::new(),
            database_max_connections: 5,
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
            catalog_dir: None,
            api_base_path: "/api".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset and blank variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = ServerConfig::default();
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Env {
            name: "DATABASE_URL",
            message: "must be set".into(),
        })?;
        let api_base_path = match get("API_BASE_PATH") {
            Some(p) => format!("/{}", p.trim_matches('/')),
            None => defaults.api_base_path,
        };
        Ok(ServerConfig {
            host: get("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", get("PORT"), defaults.port)?,
            database_url,
            database_max_connections: parsed(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            )?,
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            request_timeout_secs: parsed(
                "REQUEST_TIMEOUT_SECS",
                get("REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout_secs,
            )?,
            catalog_dir: get("CATALOG_DIR").map(PathBuf::from),
            api_base_path,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Env {
            name,
            message: format!("{:?}: {}", v, e),
        }),
    }
}
