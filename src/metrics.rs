use std::sync::{Mutex, OnceLock};

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::board::BoardError;
use crate::reconcile::Reconciliation;

pub const RECONCILE_TOTAL: &str = "balancer_reconcile_total";
pub const RECONCILE_INFEASIBLE_TOTAL: &str = "balancer_reconcile_infeasible_total";
pub const LOCK_REJECTED_TOTAL: &str = "balancer_lock_rejected_total";

// The recorder is process-global; keep the handle so repeated app builds share it.
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INIT: Mutex<()> = Mutex::new(());

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (first call only) and describe our series.
    pub fn init() -> anyhow::Result<Self> {
        let _guard = INIT.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(h) = HANDLE.get() {
            return Ok(Self { handle: h.clone() });
        }

        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        let handle = HANDLE.get_or_init(|| handle).clone();

        describe_counter!(RECONCILE_TOTAL, "Reconciliations served");
        describe_counter!(
            RECONCILE_INFEASIBLE_TOTAL,
            "Reconciliations whose locked shares claimed 100% or more"
        );
        describe_counter!(LOCK_REJECTED_TOTAL, "Board edits refused, by reason");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Count one served reconciliation. No-op without an installed recorder.
pub fn record_reconcile(rec: &Reconciliation) {
    counter!(RECONCILE_TOTAL).increment(1);
    if !rec.total.is_feasible() {
        counter!(RECONCILE_INFEASIBLE_TOTAL).increment(1);
    }
}

pub fn record_rejection(err: &BoardError) {
    counter!(LOCK_REJECTED_TOTAL, "reason" => err.code()).increment(1);
}
