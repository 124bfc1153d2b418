use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Instant;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_FIELDS: [&str; 6] = [
    "password",
    "passwordHash",
    "password_hash",
    "token",
    "secret",
    "authorization",
];

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "cookie", "x-api-key", "x-auth-token"];

fn should_ignore_path(path: &str) -> bool {
    matches!(path, "/health" | "/health/") || path.starts_with("/swagger-ui")
}

/// Redact credential-bearing keys at any depth.
///
/// Process responses carry generated passwords nested under `issuedCredentials`.
fn filter_sensitive_data(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if SENSITIVE_FIELDS.contains(&key.as_str()) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, filter_sensitive_data(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(filter_sensitive_data).collect()),
        other => other,
    }
}

fn filter_sensitive_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered_headers = headers.clone();

    for header_name in SENSITIVE_HEADERS {
        if let Ok(name) = header_name.parse::<http::HeaderName>() {
            if filtered_headers.contains_key(&name) {
                filtered_headers.insert(name, HeaderValue::from_static(REDACTED));
            }
        }
    }

    filtered_headers
}

fn body_as_json(bytes: &[u8]) -> Value {
    serde_json::from_slice::<Value>(bytes)
        .map(filter_sensitive_data)
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

pub async fn http_logger(
    req: Request,
    next: Next,
) -> std::result::Result<impl IntoResponse, (StatusCode, String)> {
    let start_time = Instant::now();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path();
    let version = req.version();
    let req_headers = req.headers().clone();
    let x_request_id = req_headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if should_ignore_path(path) || method == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let (parts, body) = req.into_parts();
    let bytes = buffer_body("request", body).await?;
    let req_body = body_as_json(&bytes);
    let req = Request::from_parts(parts, Body::from(bytes));

    let mut response = next.run(req).await;

    let latency = start_time.elapsed();
    let status = response.status();
    let res_headers = response.headers().clone();

    let res_body = if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        let (parts, body) = response.into_parts();
        let bytes = buffer_body("response", body).await?;
        let json_body = body_as_json(&bytes);
        response = Response::from_parts(parts, Body::from(bytes));
        json_body
    } else {
        Value::Object(serde_json::Map::new())
    };

    tracing::info!(
        method = ?method,
        path = %path,
        x_request_id = %x_request_id,
        version = ?version,
        req_headers = ?filter_sensitive_headers(&req_headers),
        req_body = %req_body,
        status = status.as_u16(),
        latency_ms = latency.as_millis(),
        res_headers = ?filter_sensitive_headers(&res_headers),
        res_body = %res_body,
        "HTTP request completed"
    );

    Ok(response)
}

pub async fn buffer_body<B>(
    direction: &str,
    body: B,
) -> std::result::Result<Bytes, (StatusCode, String)>
where
    B: BodyExt,
    B::Error: std::fmt::Display,
{
    match body.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => Err((
            StatusCode::BAD_REQUEST,
            format!("failed to read {direction} body: {err}"),
        )),
    }
}
