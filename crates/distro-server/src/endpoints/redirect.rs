//! Plain-HTTP to HTTPS redirection.

use axum::{
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Answers requests that did not arrive over HTTPS with `301` to the
/// `https://` form of the same URL.
///
/// TLS terminates in front of the server, so `x-forwarded-proto: https` is
/// the only sign of a secure request.
pub async fn redirect_insecure(request: Request, next: Next) -> Response {
    let secure = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
    if secure {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()));
    let Some(host) = host else {
        return AppError::BadRequest("missing Host header".to_string()).into_response();
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{}{}", host, path_and_query);

    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}
