//! Axum response adapters for gateway results.

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;

use super::{GatewayError, GuardedStream, ModelList};

#[derive(Debug, Serialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

fn openai_error(
    status: StatusCode,
    kind: &'static str,
    code: Option<&'static str>,
    message: impl std::fmt::Display,
) -> (StatusCode, Json<OpenAiErrorResponse>) {
    (
        status,
        Json(OpenAiErrorResponse {
            error: OpenAiErrorDetail {
                message: message.to_string(),
                kind,
                code,
            },
        }),
    )
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let (kind, code) = match &self {
            Self::Config { .. } => ("api_error", Some("invalid_config")),
            Self::Unauthorized => ("authentication_error", Some("invalid_api_key")),
            Self::StreamIntegrity { .. } => ("api_error", Some("upstream_stream_error")),
        };
        openai_error(status, kind, code, self).into_response()
    }
}

impl IntoResponse for ModelList {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl GuardedStream {
    /// Streams the guarded fragments as a response body.
    pub fn into_body(self) -> Body {
        Body::from_stream(self.map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    use super::*;
    use crate::gateway::{ModelDescriptor, fragments_from_iter, guard_stream_default};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_maps_to_forbidden_openai_error() {
        let response = GatewayError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            json!({"error": {
                "message": "Invalid or missing API Key",
                "type": "authentication_error",
                "code": "invalid_api_key",
            }})
        );
    }

    #[tokio::test]
    async fn stream_integrity_keeps_caller_status() {
        let response = GatewayError::StreamIntegrity {
            status: 429,
            detail: "{\"error\":\"boom\"}".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "{\"error\":\"boom\"}");
    }

    #[tokio::test]
    async fn model_list_is_served_as_json() {
        let response = ModelList::new(vec![ModelDescriptor::new("m", "uni-api")]).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"][0]["id"], "m");
    }

    #[tokio::test]
    async fn guarded_stream_becomes_response_body() {
        let stream = fragments_from_iter(["data: {\"id\":1}\n\n", "data: [DONE]\n\n"]);
        let guarded = guard_stream_default(stream).await.expect("guarded");
        let bytes = to_bytes(guarded.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"data: {\"id\":1}\n\ndata: [DONE]\n\n");
    }
}
