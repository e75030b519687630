//! Response helpers for HAL bodies.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// JSON body sent with a HAL (or negotiated plain JSON) content type.
#[derive(Debug)]
pub struct HalResponse {
    pub status: StatusCode,
    pub media_type: &'static str,
    pub location: Option<String>,
    pub body: Value,
}

impl IntoResponse for HalResponse {
    fn into_response(self) -> Response {
        let bytes = match serde_json::to_vec(&self.body) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        let mut response = (self.status, bytes).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.media_type));
        if let Some(location) = self.location.and_then(|l| HeaderValue::from_str(&l).ok()) {
            headers.insert(header::LOCATION, location);
        }
        response
    }
}

pub fn hal_ok(media_type: &'static str, body: Value) -> HalResponse {
    HalResponse {
        status: StatusCode::OK,
        media_type,
        location: None,
        body,
    }
}

pub fn hal_created(media_type: &'static str, location: String, body: Value) -> HalResponse {
    HalResponse {
        status: StatusCode::CREATED,
        media_type,
        location: Some(location),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_sets_location_and_content_type() {
        let response = hal_created(
            crate::hal::HAL_JSON,
            "http://localhost/api/actors/1".into(),
            json!({"id": 1}),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/hal+json");
        assert_eq!(response.headers()[header::LOCATION], "http://localhost/api/actors/1");
    }
}
