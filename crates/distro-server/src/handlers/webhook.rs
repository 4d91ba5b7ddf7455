//! GitHub-style update webhook.

use std::sync::{Arc, Weak};

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{MethodRouter, post},
};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::error::AppError;
use crate::reload::HotReloadServer;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
struct WebhookState {
    server: Weak<HotReloadServer>,
    secret: Option<Arc<[u8]>>,
}

/// Builds the `/updatehook` route.
///
/// With a secret, every delivery must carry a valid `X-Hub-Signature-256`.
pub fn webhook_route(server: Weak<HotReloadServer>, secret: Option<String>) -> MethodRouter {
    post(handle_webhook).with_state(WebhookState {
        server,
        secret: secret.map(|s| Arc::from(s.into_bytes())),
    })
}

/// Computes the `X-Hub-Signature-256` value of a payload.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Checks a `sha256=<hex>` signature in constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: Option<&str>) -> bool {
    let Some(expected) = signature.and_then(|s| s.strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if let Some(secret) = &state.secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("Rejected webhook delivery with a missing or invalid signature");
            return Err(AppError::Unauthorized(
                "missing or invalid X-Hub-Signature-256".to_string(),
            ));
        }
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing X-GitHub-Event header".to_string()))?;

    match event {
        "ping" => Ok(Json(json!({ "msg": "pong" })).into_response()),
        "push" | "release" => {
            info!(event, "Webhook triggered rebuild");
            let server = state
                .server
                .upgrade()
                .ok_or_else(|| AppError::Unavailable("server is shutting down".to_string()))?;
            match server.rebuild().await {
                Ok(report) => Ok(Json(report).into_response()),
                Err(e) => Err(AppError::Internal(format!(
                    "rebuild failed at the {} stage; see server logs",
                    e.stage()
                ))),
            }
        },
        other => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "msg": format!("event '{}' ignored", other) })),
        )
            .into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"ref":"refs/heads/master"}"#;
        let signature = sign(b"s3cret", body).unwrap();

        assert!(signature.starts_with("sha256="));
        assert!(verify_signature(b"s3cret", body, Some(&signature)));
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256 test case 2 of RFC 4231.
        let signature = sign(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_rejects_bad_signatures() {
        let body = b"payload";
        let signature = sign(b"s3cret", body).unwrap();

        assert!(!verify_signature(b"other", body, Some(&signature)));
        assert!(!verify_signature(b"s3cret", b"tampered", Some(&signature)));
        assert!(!verify_signature(b"s3cret", body, None));
        assert!(!verify_signature(b"s3cret", body, Some("sha1=abcdef")));
        assert!(!verify_signature(b"s3cret", body, Some("sha256=zz")));
    }

    #[test]
    fn test_empty_and_long_keys_sign() {
        let long_key = [0xaa_u8; 131];

        assert!(sign(b"", b"payload").is_ok());
        let signature = sign(&long_key, b"payload").unwrap();
        assert!(verify_signature(&long_key, b"payload", Some(&signature)));
    }
}
