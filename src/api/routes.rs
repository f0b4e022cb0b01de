//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.
//! Engine errors render as `{ "error": <kind>, "message": <text> }`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::clock::DeadlineClock;
use crate::engine::{ArenaEngine, ContestView, NewContest, SettlementReport};
use crate::error::ArenaError;
use crate::rules::validator::stake_from_f64;
use crate::types::{Contestant, OddsQuote, SettlementRequest, Wager};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub engine: Arc<ArenaEngine>,
    /// Deadlines for contests created over the API. The engine reads the
    /// same clock through its `ContestClock` handle.
    pub clock: Arc<DeadlineClock>,
    /// Contest length when a create request names no deadline.
    pub default_duration_secs: i64,
}

impl ApiState {
    pub fn new(engine: Arc<ArenaEngine>, clock: Arc<DeadlineClock>, default_duration_secs: i64) -> Self {
        Self {
            engine,
            clock,
            default_duration_secs,
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateContestBody {
    #[serde(flatten)]
    pub contest: NewContest,
    /// Alternative to `closes_at`: seconds from now.
    #[serde(default)]
    pub duration_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceWagerBody {
    pub user_id: String,
    pub contestant_id: String,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct ScoreBody {
    pub contestant_id: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ArenaError {
    fn into_response(self) -> Response {
        let status = match self {
            ArenaError::InvalidAmount(_)
            | ArenaError::InvalidTarget { .. }
            | ArenaError::InvalidContest(_) => StatusCode::BAD_REQUEST,
            ArenaError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            ArenaError::ContestNotFound(_) => StatusCode::NOT_FOUND,
            ArenaError::VotingClosed(_)
            | ArenaError::DuplicateWager { .. }
            | ArenaError::ContestExists(_)
            | ArenaError::ContestStillLive(_)
            | ArenaError::ConflictingOutcome { .. } => StatusCode::CONFLICT,
            ArenaError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(error = %self, "Request failed on ledger");
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/contests
pub async fn list_contests(State(state): State<AppState>) -> Json<Vec<ContestView>> {
    Json(state.engine.contests().await)
}

/// POST /api/contests
pub async fn create_contest(
    State(state): State<AppState>,
    Json(body): Json<CreateContestBody>,
) -> Result<(StatusCode, Json<ContestView>), ArenaError> {
    let mut params = body.contest;
    let closes_at = match params.closes_at {
        Some(at) => at,
        None => deadline_in(body.duration_secs.unwrap_or(state.default_duration_secs))?,
    };
    params.closes_at = Some(closes_at);
    let id = params
        .id
        .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
        .clone();

    params.validate()?;

    // The deadline must be visible before the contest is, or a concurrent
    // read would see no time left and close it. An existing contest keeps
    // its own deadline.
    let registered = state.clock.deadline(&id).is_none();
    if registered {
        state.clock.register(&id, closes_at);
    }

    match state.engine.create_contest(params).await {
        Ok(view) => Ok((StatusCode::CREATED, Json(view))),
        Err(e) => {
            if registered {
                state.clock.unregister(&id);
            }
            Err(e)
        }
    }
}

fn deadline_in(secs: i64) -> Result<DateTime<Utc>, ArenaError> {
    chrono::Duration::try_seconds(secs)
        .filter(|_| secs > 0)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| ArenaError::InvalidContest(format!("invalid duration: {secs}s")))
}

/// GET /api/contests/:id
pub async fn get_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContestView>, ArenaError> {
    Ok(Json(state.engine.contest(&id).await?))
}

/// GET /api/contests/:id/odds
pub async fn get_odds(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OddsQuote>, ArenaError> {
    Ok(Json(state.engine.get_odds(&id).await?))
}

/// GET /api/contests/:id/wagers
pub async fn list_wagers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Wager>>, ArenaError> {
    Ok(Json(state.engine.wagers(&id).await?))
}

/// POST /api/contests/:id/wagers
pub async fn place_wager(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PlaceWagerBody>,
) -> Result<(StatusCode, Json<Wager>), ArenaError> {
    let amount = stake_from_f64(body.amount)?;
    let wager = state
        .engine
        .place_wager(&id, &body.user_id, &body.contestant_id, amount)
        .await?;
    Ok((StatusCode::CREATED, Json(wager)))
}

/// POST /api/contests/:id/scores
pub async fn update_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ScoreBody>,
) -> Result<Json<Contestant>, ArenaError> {
    let contestant = state
        .engine
        .update_score(&id, &body.contestant_id, body.score)
        .await?;
    Ok(Json(contestant))
}

/// POST /api/contests/:id/end
pub async fn end_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContestView>, ArenaError> {
    let view = state.engine.end_contest(&id).await?;
    state.clock.end(&id);
    Ok(Json(view))
}

/// POST /api/contests/:id/settle
pub async fn settle_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SettlementRequest>,
) -> Result<Json<SettlementReport>, ArenaError> {
    Ok(Json(state.engine.settle_contest(&id, request).await?))
}

/// POST /api/contests/:id/cancel
pub async fn cancel_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SettlementReport>, ArenaError> {
    Ok(Json(state.engine.cancel_contest(&id).await?))
}

/// GET /api/balances/:user_id
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ArenaError> {
    let balance = state.engine.balance(&user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_rendering() {
        let resp = ArenaError::InsufficientBalance {
            needed: dec!(50),
            available: dec!(10),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "insufficient_balance");
        assert!(json["message"].as_str().unwrap().contains("$50.00"));
    }

    #[test]
    fn test_status_per_kind() {
        let cases = [
            (ArenaError::InvalidAmount("x".into()), StatusCode::BAD_REQUEST),
            (ArenaError::VotingClosed("c".into()), StatusCode::CONFLICT),
            (ArenaError::ContestNotFound("c".into()), StatusCode::NOT_FOUND),
            (ArenaError::LedgerUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_create_body_accepts_duration() {
        let body: CreateContestBody = serde_json::from_value(serde_json::json!({
            "contestant_a": { "id": "a", "display_name": "A", "tier": 2 },
            "contestant_b": { "id": "b", "display_name": "B" },
            "duration_secs": 120
        }))
        .unwrap();
        assert!(body.contest.id.is_none());
        assert_eq!(body.contest.contestant_a.tier, 2);
        assert_eq!(body.duration_secs, Some(120));
    }

    #[test]
    fn test_deadline_in_rejects_nonsense() {
        assert!(deadline_in(60).unwrap() > Utc::now());
        assert_eq!(deadline_in(0).unwrap_err().kind(), "invalid_contest");
        assert_eq!(deadline_in(-5).unwrap_err().kind(), "invalid_contest");
        assert_eq!(deadline_in(i64::MAX).unwrap_err().kind(), "invalid_contest");
    }
}
