use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::board::{Board, BoardError, BoardView, LockChange};
use crate::config::BalancerConfig;
use crate::metrics::{record_reconcile, record_rejection};
use crate::reconcile::{reconcile_parallel, ShapeError, TargetDivergence};

#[derive(Clone)]
pub struct AppState {
    config: Arc<BalancerConfig>,
}

impl AppState {
    pub fn new(config: BalancerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/reconcile", post(reconcile_handler))
        .route("/board/generate", post(board_generate))
        .route("/board/view", post(board_view))
        .route("/board/lock", post(board_lock))
        .route("/board/weight", post(board_weight))
        .route("/board/reset-locks", post(board_reset_locks))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------- errors ----------

#[derive(Debug)]
pub enum ApiError {
    Shape(ShapeError),
    Board(BoardError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

impl From<ShapeError> for ApiError {
    fn from(e: ShapeError) -> Self {
        ApiError::Shape(e)
    }
}

impl From<BoardError> for ApiError {
    fn from(e: BoardError) -> Self {
        ApiError::Board(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Shape(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "shape",
                    error: e.to_string(),
                },
            ),
            ApiError::Board(e) => {
                record_rejection(&e);
                let status = if e.is_rule_violation() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                (
                    status,
                    ErrorBody {
                        code: e.code(),
                        error: e.to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ---------- /reconcile ----------

#[derive(Deserialize)]
struct ReconcileReq {
    scores: Vec<f64>,
    locked: Vec<bool>,
    locked_share: Vec<f64>,
    free_weight: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReconcileResp {
    pub feasible: bool,
    /// Realized weighted total; null when the lock set is infeasible.
    pub total: Option<f64>,
    pub solved_total: Option<f64>,
    pub claimed_share: f64,
    pub effective_weights: Vec<f64>,
    pub weighted_scores: Vec<f64>,
    pub shares: Vec<f64>,
    #[serde(default)]
    pub divergences: Vec<TargetDivergence>,
}

async fn reconcile_handler(Json(body): Json<ReconcileReq>) -> Result<Json<ReconcileResp>, ApiError> {
    let rec = reconcile_parallel(
        &body.scores,
        &body.locked,
        &body.locked_share,
        &body.free_weight,
    )?;
    record_reconcile(&rec);

    if !rec.total.is_feasible() {
        warn!(target: "balancer", claimed = rec.claimed_share, "infeasible lock set");
    }

    Ok(Json(ReconcileResp {
        feasible: rec.total.is_feasible(),
        total: rec.total.value(),
        solved_total: rec.solved_total,
        claimed_share: rec.claimed_share,
        effective_weights: rec.effective_weights(),
        weighted_scores: rec.weighted_scores(),
        shares: rec.shares(),
        divergences: rec.divergences().to_vec(),
    }))
}

// ---------- /board/* ----------

#[derive(Serialize, Deserialize, Debug)]
pub struct BoardResp {
    pub board: Board,
    pub view: BoardView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<LockChange>,
}

impl BoardResp {
    fn of(board: Board) -> Self {
        let view = board.view();
        Self {
            board,
            view,
            change: None,
        }
    }
}

#[derive(Deserialize)]
struct GenerateReq {
    #[serde(default)]
    criteria: Option<usize>,
    /// Fixed seed for reproducible boards.
    #[serde(default)]
    seed: Option<u64>,
}

async fn board_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateReq>,
) -> Json<BoardResp> {
    let cfg = state.config();
    let n = req.criteria.unwrap_or(cfg.default_criteria);

    let board = match req.seed {
        Some(seed) => Board::generate(n, cfg, &mut StdRng::seed_from_u64(seed)),
        None => Board::generate(n, cfg, &mut rand::rng()),
    };
    Json(BoardResp::of(board))
}

#[derive(Deserialize)]
struct BoardReq {
    board: Board,
}

async fn board_view(Json(body): Json<BoardReq>) -> Result<Json<BoardResp>, ApiError> {
    body.board.validate()?;
    Ok(Json(BoardResp::of(body.board)))
}

async fn board_reset_locks(Json(body): Json<BoardReq>) -> Result<Json<BoardResp>, ApiError> {
    let mut board = body.board;
    board.validate()?;
    board.reset_locks();
    Ok(Json(BoardResp::of(board)))
}

#[derive(Deserialize)]
struct LockReq {
    board: Board,
    index: usize,
}

async fn board_lock(
    State(state): State<AppState>,
    Json(body): Json<LockReq>,
) -> Result<Json<BoardResp>, ApiError> {
    let mut board = body.board;
    board.validate()?;
    let change = board.toggle_lock(body.index, state.config())?;
    let mut resp = BoardResp::of(board);
    resp.change = Some(change);
    Ok(Json(resp))
}

#[derive(Deserialize)]
struct WeightReq {
    board: Board,
    index: usize,
    weight: f64,
}

async fn board_weight(
    State(state): State<AppState>,
    Json(body): Json<WeightReq>,
) -> Result<Json<BoardResp>, ApiError> {
    let mut board = body.board;
    board.validate()?;
    board.set_weight(body.index, body.weight, state.config())?;
    Ok(Json(BoardResp::of(board)))
}
