//! Extractors that report rejections through `WebServerError`
//!
//! axum's own extractors answer bad input with plain-text bodies (often 422).
//! These wrappers keep every client error on the JSON error contract.

use axum::async_trait;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::StatusCode;

use crate::error::WebServerError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(WebServerError))]
pub struct ApiJson<T>(pub T);

/// Query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(WebServerError))]
pub struct ApiQuery<T>(pub T);

/// multipart/form-data body
pub struct ApiMultipart(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = WebServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Multipart::from_request(req, state).await?))
    }
}

impl From<JsonRejection> for WebServerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return WebServerError::PayloadTooLarge;
        }
        WebServerError::invalid(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for WebServerError {
    fn from(rejection: QueryRejection) -> Self {
        WebServerError::invalid(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for WebServerError {
    fn from(rejection: MultipartRejection) -> Self {
        WebServerError::invalid(format!("Expected a multipart upload: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Paging {
        limit: usize,
    }

    #[tokio::test]
    async fn test_bad_query_is_invalid_request() {
        let request = axum::http::Request::builder().uri("/?limit=abc").body(Body::empty()).unwrap();
        let (mut parts, _) = request.into_parts();
        let result = ApiQuery::<Paging>::from_request_parts(&mut parts, &()).await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Invalid query string"));
    }

    #[tokio::test]
    async fn test_good_query_passes_through() {
        let request = axum::http::Request::builder().uri("/?limit=5").body(Body::empty()).unwrap();
        let (mut parts, _) = request.into_parts();
        let ApiQuery(paging) = ApiQuery::<Paging>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(paging.limit, 5);
    }

    #[tokio::test]
    async fn test_json_without_content_type_is_invalid_request() {
        let request = axum::http::Request::builder().body(Body::from(r#"{"limit":1}"#)).unwrap();
        let err = ApiJson::<Paging>::from_request(request, &()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
