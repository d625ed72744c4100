use crate::models::{ErrorBody, SubmitRequest, SubmitResponse, WebhookPayload};
use crate::rate_limit::RateLimiter;
use crate::routing::{self, NextUrlParams};
use crate::sheets::{LeadStore, SheetsClient};
use crate::validation::{self, PhoneRule, ISRAELI_MOBILE};
use crate::webhook::{DispatchError, WebhookApi, WebhookClient, DEFAULT_TIMEOUT};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use constant_time_eq::constant_time_eq;
use serde_json::json;
use std::{
    env,
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_PORT: u16 = 3000;

const OK_MESSAGE: &str = "Thank you! We will contact you soon.";
const DUPLICATE_MESSAGE: &str =
    "You have already submitted this form. We will be in touch soon.";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LeadStore>,
    pub webhook: Arc<dyn WebhookApi>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Production webhook endpoint; `None` only when misconfigured.
    pub webhook_url: Option<String>,
    /// Unlocks the caller-supplied webhook override. `None` disables it.
    pub test_secret: Option<String>,
    pub webhook_timeout: Duration,
    pub phone_rule: PhoneRule,
    missing_webhook_warned: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LeadStore>,
        webhook: Arc<dyn WebhookApi>,
        webhook_url: Option<String>,
        test_secret: Option<String>,
    ) -> Self {
        Self {
            store,
            webhook,
            rate_limiter: Arc::new(RateLimiter::with_defaults()),
            webhook_url,
            test_secret,
            webhook_timeout: DEFAULT_TIMEOUT,
            phone_rule: ISRAELI_MOBILE,
            missing_webhook_warned: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub async fn run_server() -> Result<()> {
    let store: Arc<dyn LeadStore> = Arc::new(SheetsClient::from_env()?);
    let webhook: Arc<dyn WebhookApi> = Arc::new(WebhookClient::new());
    let webhook_url = env::var("MAKE_WEBHOOK_URL").ok().filter(|s| !s.is_empty());
    let test_secret = env::var("TEST_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

    let state = AppState::new(store, webhook, webhook_url, test_secret);
    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/submit", post(handle_submit))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn reject(
    status: StatusCode,
    kind: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> (StatusCode, Json<SubmitResponse>) {
    (
        status,
        Json(SubmitResponse::error(
            message,
            ErrorBody {
                kind: kind.to_string(),
                details,
                status: None,
                status_text: None,
            },
        )),
    )
}

async fn handle_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<SubmitResponse>) {
    let ip = extract_ip(&headers);
    if !state.rate_limiter.admit(&ip).await {
        warn!("Rate limit exceeded for {}", ip);
        return reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests. Please try again later.",
            None,
        );
    }

    if body.len() > MAX_BODY_BYTES {
        warn!("Rejecting submission: body too large ({} bytes)", body.len());
        return reject(
            StatusCode::PAYLOAD_TOO_LARGE,
            "bad_request",
            "Request body too large.",
            None,
        );
    }

    let content_type_ok = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        == Some(true);
    if !content_type_ok {
        warn!(
            "Rejecting submission: unsupported content-type {:?}",
            headers.get(header::CONTENT_TYPE)
        );
        return reject(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "bad_request",
            "Expected an application/json body.",
            None,
        );
    }

    let request: SubmitRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Rejecting submission: invalid JSON body: {}", e);
            return reject(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Invalid request body.",
                None,
            );
        }
    };

    let lead = match validation::validate_submission(&request, &state.phone_rule) {
        Ok(lead) => lead,
        Err(errors) => {
            let summary = validation::aggregate_errors(&errors);
            warn!("Validation failed for {}: {}", ip, summary);
            return reject(
                StatusCode::BAD_REQUEST,
                "validation",
                format!("Validation failed: {}", summary),
                Some(json!(errors)),
            );
        }
    };

    let lead_id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let payload = WebhookPayload::from_lead(&lead, lead_id.clone(), created_at);
    let assignee = routing::assignee(lead.product);
    let next_url = routing::next_url(&NextUrlParams {
        lead_id: &lead_id,
        full_name: &lead.full_name,
        email: &lead.email,
        phone: &lead.phone,
        assignee,
    });

    if let Some(override_url) = request.webhook_url.as_deref() {
        return handle_bypass(&state, &request, override_url, &payload, lead_id, next_url).await;
    }

    let Some(endpoint) = state.webhook_url.as_deref() else {
        if !state.missing_webhook_warned.swap(true, Ordering::Relaxed) {
            warn!("MAKE_WEBHOOK_URL is not configured; rejecting submissions");
        }
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "configuration",
            "No webhook URL configured.",
            None,
        );
    };

    match state.store.exists_by_email(&lead.email).await {
        Err(e) => {
            error!("Duplicate check failed for {}: {:#}", lead.email, e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "service_unavailable",
                "Could not verify your submission. Please try again.",
                None,
            )
        }
        Ok(true) => {
            info!("Duplicate lead for {}", lead.email);
            (
                StatusCode::OK,
                Json(SubmitResponse::duplicate(DUPLICATE_MESSAGE)),
            )
        }
        Ok(false) => {
            // Lead is accepted from here on; dispatch is best-effort and
            // must not fail the submission.
            if let Err(e) = state
                .webhook
                .send(endpoint, &payload, state.webhook_timeout)
                .await
            {
                error!("Webhook dispatch failed for accepted lead {}: {}", lead_id, e);
            } else {
                info!("Lead {} accepted, assignee {}", lead_id, assignee);
            }
            (
                StatusCode::OK,
                Json(SubmitResponse::ok(OK_MESSAGE, lead_id, next_url)),
            )
        }
    }
}

/// Testing-only branch: the caller supplies the webhook endpoint and must
/// present the server-held secret. Skips the duplicate check and surfaces
/// dispatch failures instead of swallowing them.
async fn handle_bypass(
    state: &AppState,
    request: &SubmitRequest,
    override_url: &str,
    payload: &WebhookPayload,
    lead_id: String,
    next_url: String,
) -> (StatusCode, Json<SubmitResponse>) {
    let Some(secret) = state.test_secret.as_deref() else {
        warn!("Webhook override attempted but TEST_WEBHOOK_SECRET is not configured");
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "configuration",
            "Webhook override is not enabled.",
            None,
        );
    };

    let presented = request.test_secret.as_deref().unwrap_or("");
    let authorized = presented.len() == secret.len()
        && constant_time_eq(presented.as_bytes(), secret.as_bytes());
    if !authorized {
        warn!("Webhook override attempted with a bad secret");
        return reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Invalid test secret.",
            None,
        );
    }

    info!("Using caller-supplied webhook URL for testing");
    match state
        .webhook
        .send(override_url, payload, state.webhook_timeout)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(SubmitResponse::ok(OK_MESSAGE, lead_id, next_url)),
        ),
        Err(DispatchError::Timeout) => reject(
            StatusCode::GATEWAY_TIMEOUT,
            "webhook_timeout",
            "Request timed out. Please try again.",
            None,
        ),
        Err(DispatchError::Network(e)) => reject(
            StatusCode::BAD_GATEWAY,
            "webhook_network",
            "Failed to reach the webhook endpoint.",
            Some(json!(e.to_string())),
        ),
        Err(DispatchError::Rejected { status, body }) => {
            let status_text = StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown")
                .to_string();
            (
                StatusCode::BAD_GATEWAY,
                Json(SubmitResponse::error(
                    "The webhook endpoint rejected the payload.",
                    ErrorBody {
                        kind: "webhook_rejected".to_string(),
                        details: Some(json!(body)),
                        status: Some(status),
                        status_text: Some(status_text),
                    },
                )),
            )
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}

fn extract_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());
        assert_eq!(extract_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_placeholder() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(extract_ip(&headers), "198.51.100.2");
        assert_eq!(extract_ip(&HeaderMap::new()), "unknown");
    }
}
