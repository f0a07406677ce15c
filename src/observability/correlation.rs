use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const MAX_CORRELATION_ID_LENGTH: usize = 200;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(correlation_id: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Validate correlation ID format and length
fn validate_correlation_id(correlation_id: &str) -> Result<(), &'static str> {
    if correlation_id.is_empty() {
        return Err("Correlation ID cannot be empty");
    }

    if correlation_id.len() > MAX_CORRELATION_ID_LENGTH {
        return Err("Correlation ID exceeds maximum length");
    }

    if !correlation_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Correlation ID contains invalid characters");
    }

    Ok(())
}

/// Attach a `RequestContext` to every request and echo its ids back in the
/// response headers. The chat transport forwards its update id as the
/// correlation id so bot logs and daemon logs line up.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    if let Some(id) = &correlation_id {
        if let Err(reason) = validate_correlation_id(id) {
            warn!(
                correlation_id = %id,
                reason = %reason,
                "Invalid correlation ID rejected"
            );
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let context = RequestContext::new(correlation_id);
    req.extensions_mut().insert(context.clone());

    let span = info_span!(
        "request",
        correlation_id = %context.correlation_id,
        request_id = %context.request_id,
        method = %req.method(),
        uri = %req.uri().path(),
    );

    async move {
        let mut response = next.run(req).await;

        response.headers_mut().insert(
            CORRELATION_ID_HEADER,
            HeaderValue::from_str(&context.correlation_id)
                .unwrap_or_else(|_| HeaderValue::from_static("invalid-correlation-id")),
        );
        response.headers_mut().insert(
            REQUEST_ID_HEADER,
            HeaderValue::from_str(&context.request_id)
                .unwrap_or_else(|_| HeaderValue::from_static("invalid-request-id")),
        );

        Ok(response)
    }
    .instrument(span)
    .await
}
