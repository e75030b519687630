//! Router assembly: common routes at the top level, HAL resources under the API base path.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::error::ConfigError;
use crate::server_config::ServerConfig;
use crate::state::AppState;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// The full application with its middleware stack. Used by the server binary and the integration tests.
pub fn app(state: AppState, config: &ServerConfig) -> Result<Router, ConfigError> {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let api = entity_routes(state.clone());
    let router = Router::new().merge(common_routes(state));
    let router = if config.api_base_path.trim_matches('/').is_empty() {
        router.merge(api)
    } else {
        router.nest(&config.api_base_path, api)
    };
    let mut router = router
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid));
    if !config.cors_origins.is_empty() {
        router = router.layer(cors_layer(config)?);
    }
    Ok(router)
}

fn cors_layer(config: &ServerConfig) -> Result<CorsLayer, ConfigError> {
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>().map_err(|e| ConfigError::Env {
                name: "CORS_ORIGINS",
                message: format!("{}: {}", o, e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .expose_headers([axum::http::header::LOCATION])
        .max_age(Duration::from_secs(3600)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_cors_origin() {
        let config = ServerConfig {
            cors_origins: vec!["http://ok.example".into(), "bad\norigin".into()],
            ..ServerConfig::default()
        };
        assert!(matches!(
            cors_layer(&config),
            Err(ConfigError::Env { name: "CORS_ORIGINS", .. })
        ));
    }
}
