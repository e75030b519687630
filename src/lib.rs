//! Movies data REST: catalog-driven HAL resources for actors, characters, directors and movies on PostgreSQL.

pub mod case;
pub mod config;
pub mod database;
pub mod error;
pub mod extractors;
pub mod hal;
pub mod handlers;
pub mod migration;
pub mod query;
pub mod response;
pub mod routes;
pub mod server_config;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use database::{connect, ensure_database_exists};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::{app, common_routes, entity_routes};
pub use server_config::ServerConfig;
pub use service::CrudService;
pub use state::AppState;
