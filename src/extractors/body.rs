//! Request bodies: JSON objects for items, `text/uri-list` for association endpoints.

use crate::error::AppError;
use crate::hal::{HAL_JSON, JSON};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

pub const URI_LIST: &str = "text/uri-list";

/// Media type without parameters, lowercased. None when the header is absent.
fn content_type(headers: &HeaderMap) -> Option<String> {
    headers.get(header::CONTENT_TYPE).map(|v| {
        v.to_str()
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    })
}

/// JSON object body. Accepted as `application/json`, `application/hal+json` or without content type.
#[derive(Debug)]
pub struct JsonBody(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match content_type(req.headers()).as_deref() {
            None | Some(JSON) | Some(HAL_JSON) => {}
            Some(other) => {
                return Err(AppError::UnsupportedMediaType(other.to_string()).into_response())
            }
        }
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(JsonBody(map)),
            Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into()).into_response()),
            Err(e) => Err(AppError::BadRequest(format!("malformed JSON: {}", e)).into_response()),
        }
    }
}

/// `text/uri-list` body: one URI per line, blank lines and `#` comments skipped.
#[derive(Debug)]
pub struct UriList(pub Vec<String>);

pub(crate) fn parse_uri_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl<S> FromRequest<S> for UriList
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match content_type(req.headers()).as_deref() {
            Some(URI_LIST) => {}
            other => {
                let got = other.unwrap_or("none").to_string();
                return Err(AppError::UnsupportedMediaType(format!("expected {}, got {}", URI_LIST, got))
                    .into_response());
            }
        }
        let text = String::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(UriList(parse_uri_list(&text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn parses_uri_lists() {
        let text = "http://localhost/api/actors/1\r\n\n# comment\n  /api/actors/2  \n";
        assert_eq!(parse_uri_list(text), vec!["http://localhost/api/actors/1", "/api/actors/2"]);
    }

    #[tokio::test]
    async fn accepts_json_without_content_type() {
        let JsonBody(map) = JsonBody::from_request(request(None, r#"{"name":"M"}"#), &())
            .await
            .unwrap();
        assert_eq!(map["name"], "M");
    }

    #[tokio::test]
    async fn accepts_hal_json_with_charset() {
        let req = request(Some("application/hal+json;charset=UTF-8"), r#"{"name":"Q"}"#);
        assert!(JsonBody::from_request(req, &()).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_other_media_types() {
        let err = JsonBody::from_request(request(Some("text/plain"), "{}"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let err = UriList::from_request(request(Some("application/json"), "[]"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn rejects_non_object_json() {
        let err = JsonBody::from_request(request(Some("application/json"), "[1, 2]"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = JsonBody::from_request(request(None, "{"), &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
