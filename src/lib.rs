// src/lib.rs
// Public library surface for the binary, the demo and integration tests.

pub mod api;
pub mod board;
pub mod config;
pub mod metrics;
pub mod reconcile;
pub mod render;

// ---- Re-exports for stable public API ----
pub use crate::board::{Board, BoardError, BoardView, LockChange};
pub use crate::config::BalancerConfig;
pub use crate::reconcile::{
    clamp_weight, reconcile, reconcile_parallel, CriterionInput, DivergenceCause, GrandTotal,
    Reconciliation, ShapeError, TargetDivergence, WEIGHT_MAX, WEIGHT_MIN,
};

use axum::Router;
use tracing::info;

pub const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

/// `/metrics` is mounted only with DEBUG_ROUTES=1.
pub fn debug_routes_enabled() -> bool {
    std::env::var(ENV_DEBUG_ROUTES).ok().as_deref() == Some("1")
}

/// Build the full application Router from the environment
/// (config file + env overrides, optional metrics route).
pub fn app() -> anyhow::Result<Router> {
    let cfg = BalancerConfig::load()?;
    app_with_config(cfg)
}

pub fn app_with_config(cfg: BalancerConfig) -> anyhow::Result<Router> {
    info!(
        target: "balancer",
        default_criteria = cfg.default_criteria,
        lock_ceiling = cfg.lock_ceiling,
        "building router"
    );
    let mut router = api::create_router(api::AppState::new(cfg));
    if debug_routes_enabled() {
        let m = metrics::Metrics::init()?;
        router = router.merge(m.router());
    }
    Ok(router)
}
