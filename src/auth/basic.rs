use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use tracing::{debug, warn};

use crate::observability::correlation::RequestContext;

/// Fixed API username; only the password is configurable
pub const API_USERNAME: &str = "lnurld";

#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
    enabled: bool,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl BasicAuth {
    /// Authentication is enabled iff a password is given
    pub fn new(password: Option<String>) -> Self {
        Self {
            username: API_USERNAME.to_string(),
            enabled: password.is_some(),
            password: password.unwrap_or_default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn verify(&self, auth_header: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let Some(credentials) = auth_header.strip_prefix("Basic ") else {
            return false;
        };

        match base64::engine::general_purpose::STANDARD.decode(credentials.trim()) {
            Ok(decoded) => {
                let expected = format!("{}:{}", self.username, self.password);
                constant_time_eq(&decoded, expected.as_bytes())
            }
            Err(_) => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"lnurld\"")
        .body(Body::from("Unauthorized"))
        .unwrap_or_else(|_| Response::new(Body::from("Unauthorized")))
}

pub async fn basic_auth_middleware(
    auth: Arc<BasicAuth>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !auth.enabled {
        return Ok(next.run(request).await);
    }

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let correlation_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.correlation_id.clone())
        .unwrap_or_default();

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let failure_reason = match auth_header {
        Some(header) if auth.verify(header) => {
            debug!(
                method = %method,
                path = %path,
                username = %auth.username,
                correlation_id = %correlation_id,
                "Authentication successful"
            );
            return Ok(next.run(request).await);
        }
        Some(_) => "invalid_credentials",
        None => "missing_authorization_header",
    };

    warn!(
        method = %method,
        path = %path,
        remote_addr = %remote_addr,
        auth_result = "failure",
        failure_reason,
        correlation_id = %correlation_id,
        "Authentication failed"
    );
    Ok(unauthorized())
}
