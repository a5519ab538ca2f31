//! HTTP surface for the conversation engine
//!
//! Inbound messages arrive from the messaging gateway's webhook; the
//! scheduler endpoints are hit by an external cron.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::engine::ConversationEngine;
use crate::identity::log_tag;
use crate::scheduler::Scheduler;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InboundMessage {
    pub from: String,
    pub message: String,
    #[serde(default)]
    pub is_group: bool,
}

impl InboundMessage {
    /// Group chats are never answered.
    pub fn is_group_origin(&self) -> bool {
        self.is_group || self.from.ends_with("@g.us")
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: ConversationEngine,
    pub scheduler: Arc<Scheduler>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Inbound Message Webhook
/// =============================

async fn receive_message(
    State(state): State<ApiState>,
    Json(msg): Json<InboundMessage>,
) -> (StatusCode, Json<ApiResponse>) {
    if msg.is_group_origin() {
        debug!(from = %log_tag(&msg.from), "Group message discarded");
        return (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "route": "discarded" }))),
        );
    }

    if msg.from.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Missing sender".into())),
        );
    }

    let route = state.engine.handle_message(&msg.from, &msg.message).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({ "route": route.as_str() }))),
    )
}

/// =============================
/// Scheduler Endpoints
/// =============================

async fn run_reminders(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let now = state.engine.services().clock.now();
    match state.scheduler.dispatch_due_reminders(now).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))),
        Err(e) => {
            error!("Reminder job failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Reminder job failed: {}", e))),
            )
        }
    }
}

async fn run_monthly_reports(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let today = state.engine.services().today();
    match state.scheduler.dispatch_monthly_reports(today).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))),
        Err(e) => {
            error!("Monthly report job failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Monthly report job failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(engine: ConversationEngine, scheduler: Arc<Scheduler>) -> Router {
    let state = ApiState { engine, scheduler };

    Router::new()
        .route("/health", get(health))
        .route("/webhook/message", post(receive_message))
        .route("/scheduler/reminders", post(run_reminders))
        .route("/scheduler/monthly-reports", post(run_monthly_reports))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: ConversationEngine,
    scheduler: Arc<Scheduler>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine, scheduler);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::llm::ScriptedIntentModel;
    use crate::messenger::RecordingMessenger;
    use crate::rate_limit::UnlimitedRateLimiter;
    use crate::scheduler::TextReportGenerator;
    use crate::services::Services;
    use crate::session::InMemorySessionStore;
    use crate::store::InMemoryFinanceStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::NaiveDate;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<RecordingMessenger>) {
        let store = Arc::new(InMemoryFinanceStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let services = Services::new(
            store.clone(),
            Arc::new(InMemorySessionStore::new()),
            messenger.clone(),
            Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())),
        );
        let scheduler = Arc::new(Scheduler::new(
            services.clone(),
            Arc::new(TextReportGenerator::new(store)),
            7,
        ));
        let engine = ConversationEngine::new(
            services,
            Arc::new(ScriptedIntentModel::new()),
            Arc::new(UnlimitedRateLimiter),
        );
        (create_router(engine, scheduler), messenger)
    }

    async fn post_json(router: Router, uri: &str, body: serde_json::Value) -> ApiResponse {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_group_messages_are_discarded() {
        let (router, messenger) = app();
        let body = post_json(
            router,
            "/webhook/message",
            serde_json::json!({ "from": "120363025@g.us", "message": "oi" }),
        )
        .await;

        assert!(body.success);
        assert_eq!(body.data.unwrap()["route"], "discarded");
        assert!(messenger.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_direct_message_reaches_engine() {
        let (router, messenger) = app();
        let body = post_json(
            router,
            "/webhook/message",
            serde_json::json!({ "from": "5511911112222@c.us", "message": "oi" }),
        )
        .await;

        assert_eq!(body.data.unwrap()["route"], "registration");
        assert!(messenger.last_to("5511911112222@c.us").await.is_some());
    }

    #[tokio::test]
    async fn test_scheduler_endpoints_report_counts() {
        let (router, _) = app();
        let body = post_json(router.clone(), "/scheduler/reminders", serde_json::json!({})).await;
        assert_eq!(body.data.unwrap()["sent"], 0);

        let body = post_json(router, "/scheduler/monthly-reports", serde_json::json!({})).await;
        assert!(body.success);
    }
}
