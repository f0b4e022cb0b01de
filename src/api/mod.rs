//! HTTP API — axum server exposing the engine.
//!
//! Serves a JSON REST API over contests, wagers and settlement.
//! CORS enabled for browser clients.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub use routes::{ApiState, AppState};

/// Bind the API port and serve in a background task.
///
/// Binding happens before spawning so a taken port fails startup instead
/// of dying silently in the task.
pub async fn spawn_api(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/contests",
            get(routes::list_contests).post(routes::create_contest),
        )
        .route("/api/contests/:id", get(routes::get_contest))
        .route("/api/contests/:id/odds", get(routes::get_odds))
        .route(
            "/api/contests/:id/wagers",
            get(routes::list_wagers).post(routes::place_wager),
        )
        .route("/api/contests/:id/scores", post(routes::update_score))
        .route("/api/contests/:id/end", post(routes::end_contest))
        .route("/api/contests/:id/settle", post(routes::settle_contest))
        .route("/api/contests/:id/cancel", post(routes::cancel_contest))
        .route("/api/balances/:user_id", get(routes::get_balance))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DeadlineClock;
    use crate::engine::{ArenaEngine, EngineConfig};
    use crate::error::LedgerError;
    use crate::ledger::{InMemoryLedger, MockBalanceLedger};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let ledger = Arc::new(InMemoryLedger::with_balances([
            ("u1", dec!(1000)),
            ("u2", dec!(1000)),
            ("poor", dec!(10)),
        ]));
        state_with(ledger)
    }

    fn state_with(ledger: Arc<dyn crate::ledger::BalanceLedger>) -> AppState {
        let clock = Arc::new(DeadlineClock::new());
        let engine = Arc::new(ArenaEngine::new(EngineConfig::default(), ledger, clock.clone()));
        Arc::new(ApiState::new(engine, clock, 300))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router) {
        let (status, _) = call(
            app,
            "POST",
            "/api/contests",
            Some(json!({
                "id": "battle-1",
                "contestant_a": { "id": "alice", "display_name": "Alice" },
                "contestant_b": { "id": "bob", "display_name": "Bob" },
                "duration_secs": 600
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let (status, _) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_quote() {
        let app = build_router(test_state());
        create(&app).await;

        let (status, json) = call(&app, "GET", "/api/contests/battle-1/odds", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["odds_a"].as_f64().unwrap(), 1.8);
        assert_eq!(json["total_pool"].as_f64().unwrap(), 0.0);

        let (status, json) = call(&app, "GET", "/api/contests", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["phase"], "open");
    }

    #[tokio::test]
    async fn test_place_wager_and_list() {
        let app = build_router(test_state());
        create(&app).await;

        let (status, json) = call(
            &app,
            "POST",
            "/api/contests/battle-1/wagers",
            Some(json!({ "user_id": "u1", "contestant_id": "alice", "amount": 100.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["odds_at_placement"].as_f64().unwrap(), 1.8);
        assert_eq!(json["potential_payout"].as_f64().unwrap(), 180.0);
        assert_eq!(json["status"], "active");

        let (_, json) = call(&app, "GET", "/api/contests/battle-1/wagers", None).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (_, json) = call(&app, "GET", "/api/balances/u1", None).await;
        assert_eq!(json["balance"].as_f64().unwrap(), 900.0);
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let app = build_router(test_state());
        create(&app).await;
        let wager = |user: &str, target: &str, amount: f64| {
            json!({ "user_id": user, "contestant_id": target, "amount": amount })
        };

        let (status, json) = call(&app, "GET", "/api/contests/nope/odds", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "contest_not_found");

        let uri = "/api/contests/battle-1/wagers";
        let (status, json) = call(&app, "POST", uri, Some(wager("u1", "alice", -1.0))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_amount");

        let (status, _) = call(&app, "POST", uri, Some(wager("u1", "carol", 5.0))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = call(&app, "POST", uri, Some(wager("poor", "alice", 50.0))).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(json["error"], "insufficient_balance");

        call(&app, "POST", uri, Some(wager("u1", "alice", 5.0))).await;
        let (status, json) = call(&app, "POST", uri, Some(wager("u1", "bob", 5.0))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "duplicate_wager");

        let (status, json) = call(&app, "POST", "/api/contests/battle-1/settle", Some(json!({ "kind": "tie" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "contest_still_live");
    }

    #[tokio::test]
    async fn test_end_then_settle() {
        let app = build_router(test_state());
        create(&app).await;
        let uri = "/api/contests/battle-1/wagers";
        call(&app, "POST", uri, Some(json!({ "user_id": "u1", "contestant_id": "alice", "amount": 100.0 }))).await;
        call(&app, "POST", uri, Some(json!({ "user_id": "u2", "contestant_id": "bob", "amount": 200.0 }))).await;

        let (status, _) = call(
            &app,
            "POST",
            "/api/contests/battle-1/scores",
            Some(json!({ "contestant_id": "alice", "score": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = call(&app, "POST", "/api/contests/battle-1/end", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["phase"], "closed");

        let (status, json) = call(&app, "POST", uri, Some(json!({ "user_id": "poor", "contestant_id": "bob", "amount": 1.0 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "voting_closed");

        let (status, json) = call(&app, "POST", "/api/contests/battle-1/settle", Some(json!({ "kind": "scores" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"]["kind"], "winner");
        assert_eq!(json["outcome"]["contestant_id"], "alice");
        assert_eq!(json["already_settled"], false);

        let (_, json) = call(&app, "GET", "/api/balances/u1", None).await;
        assert_eq!(json["balance"].as_f64().unwrap(), 1080.0);
        let (_, json) = call(&app, "GET", "/api/balances/u2", None).await;
        assert_eq!(json["balance"].as_f64().unwrap(), 800.0);

        let (status, json) = call(&app, "POST", "/api/contests/battle-1/cancel", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "conflicting_outcome");
    }

    #[tokio::test]
    async fn test_cancel_refunds() {
        let app = build_router(test_state());
        create(&app).await;
        call(
            &app,
            "POST",
            "/api/contests/battle-1/wagers",
            Some(json!({ "user_id": "u1", "contestant_id": "alice", "amount": 40.0 })),
        )
        .await;

        let (status, json) = call(&app, "POST", "/api/contests/battle-1/cancel", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["wagers"][0]["status"], "refunded");

        let (_, json) = call(&app, "GET", "/api/balances/u1", None).await;
        assert_eq!(json["balance"].as_f64().unwrap(), 1000.0);
    }

    #[tokio::test]
    async fn test_ledger_outage_is_503() {
        let mut ledger = MockBalanceLedger::new();
        ledger
            .expect_balance()
            .returning(|_| Err(LedgerError::Unavailable("down".into())));
        let app = build_router(state_with(Arc::new(ledger)));
        create(&app).await;

        let (status, json) = call(
            &app,
            "POST",
            "/api/contests/battle-1/wagers",
            Some(json!({ "user_id": "u1", "contestant_id": "alice", "amount": 5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "ledger_unavailable");
    }

    #[tokio::test]
    async fn test_duplicate_contest_is_conflict() {
        let app = build_router(test_state());
        create(&app).await;
        let (status, json) = call(
            &app,
            "POST",
            "/api/contests",
            Some(json!({
                "id": "battle-1",
                "contestant_a": { "id": "x", "display_name": "X" },
                "contestant_b": { "id": "y", "display_name": "Y" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "contest_exists");
    }

    #[tokio::test]
    async fn test_rejected_contest_leaves_no_deadline() {
        let state = test_state();
        let app = build_router(state.clone());
        let (status, json) = call(
            &app,
            "POST",
            "/api/contests",
            Some(json!({
                "id": "battle-1",
                "contestant_a": { "id": "alice", "display_name": "Alice" },
                "contestant_b": { "id": "alice", "display_name": "Alice again" },
                "duration_secs": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_contest");
        assert!(state.clock.deadline("battle-1").is_none());

        create(&app).await;
        let deadline = state.clock.deadline("battle-1").unwrap();
        assert!(deadline - chrono::Utc::now() > chrono::Duration::seconds(500));

        let (_, json) = call(&app, "GET", "/api/contests/battle-1", None).await;
        assert_eq!(json["phase"], "open");
    }
}
