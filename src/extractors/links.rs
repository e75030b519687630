//! Base URL for absolute links and the negotiated response media type.

use crate::hal::{negotiate, LinkBuilder};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

pub const FORWARDED_PROTO_HEADER: &str = "X-Forwarded-Proto";
pub const FORWARDED_HOST_HEADER: &str = "X-Forwarded-Host";

const DEFAULT_ORIGIN: &str = "http://localhost";

/// Per-request HAL settings.
#[derive(Clone, Debug)]
pub struct HalContext {
    pub links: LinkBuilder,
    pub media_type: &'static str,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        // Proxies may append; the first entry is the client-facing one.
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `scheme://host[:port]` as seen by the client.
pub(crate) fn origin(headers: &HeaderMap) -> String {
    let host = header_str(headers, FORWARDED_HOST_HEADER).or_else(|| header_str(headers, header::HOST.as_str()));
    match host {
        Some(host) => {
            let scheme = header_str(headers, FORWARDED_PROTO_HEADER).unwrap_or("http");
            format!("{}://{}", scheme, host)
        }
        None => DEFAULT_ORIGIN.to_string(),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for HalContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let links = LinkBuilder::new(&origin(&parts.headers), &state.api_base_path);
        let accept = parts.headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
        Ok(HalContext {
            links,
            media_type: negotiate(accept),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn defaults_to_localhost() {
        assert_eq!(origin(&HeaderMap::new()), "http://localhost");
    }

    #[test]
    fn uses_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("movies.internal:8080"));
        assert_eq!(origin(&headers), "http://movies.internal:8080");
    }

    #[test]
    fn forwarded_headers_win() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("10.0.0.4:8080"));
        headers.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("movies.example, proxy.local"));
        headers.insert(FORWARDED_PROTO_HEADER, HeaderValue::from_static("https"));
        assert_eq!(origin(&headers), "https://movies.example");
    }
}
