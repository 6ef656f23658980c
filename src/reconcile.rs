//! # Weight Reconciliation
//!
//! Pure core of the balancer. Given per-criterion scores, lock flags, locked
//! target shares and free (slider) weights, derives one consistent state:
//!
//! - grand total of weighted scores (or `Infeasible` when locks claim ≥ 100%),
//! - effective weight per row (locked rows are back-solved to hold their share),
//! - weighted score per row (`score * effective_weight`),
//! - share of the grand total per row.
//!
//! Unlocked contribution `U` must be the `(1 - L)` fraction of the total, so the
//! total is back-solved as `U / (1 - L)` and every locked row gets the weight
//! that makes `score * w == locked_share * total`. Weights are clamped to the
//! slider range `[0, 10]`; when a clamp bites, the realized share drifts from
//! the target and the drift is reported in [`Reconciliation::divergences`].
//!
//! No logging, no state: every call recomputes from scratch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest representable weight.
pub const WEIGHT_MIN: f64 = 0.0;
/// Highest representable weight (slider upper bound).
pub const WEIGHT_MAX: f64 = 10.0;

/// Realized vs requested share tolerance for divergence reporting.
pub const SHARE_TOLERANCE: f64 = 1e-9;

/// Clamp to [WEIGHT_MIN, WEIGHT_MAX]. NaN collapses to the lower bound.
pub fn clamp_weight(x: f64) -> f64 {
    if x.is_nan() {
        WEIGHT_MIN
    } else {
        x.clamp(WEIGHT_MIN, WEIGHT_MAX)
    }
}

/// One input row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CriterionInput {
    pub score: f64,
    #[serde(default)]
    pub locked: bool,
    /// Target fraction of the total; only read when `locked`.
    #[serde(default)]
    pub locked_share: f64,
    /// Weight used verbatim (after clamping) when not locked.
    #[serde(default)]
    pub free_weight: f64,
}

impl CriterionInput {
    pub fn free(score: f64, free_weight: f64) -> Self {
        Self {
            score,
            locked: false,
            locked_share: 0.0,
            free_weight,
        }
    }

    pub fn locked(score: f64, locked_share: f64) -> Self {
        Self {
            score,
            locked: true,
            locked_share,
            free_weight: 0.0,
        }
    }
}

/// Grand total of the reconciled state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GrandTotal {
    /// Realized sum of weighted scores.
    Feasible { total: f64 },
    /// Locked shares alone claim the whole total (or more).
    Infeasible { claimed: f64 },
}

impl GrandTotal {
    pub fn value(&self) -> Option<f64> {
        match *self {
            GrandTotal::Feasible { total } => Some(total),
            GrandTotal::Infeasible { .. } => None,
        }
    }

    /// Float form with NaN standing in for "undefined".
    pub fn as_f64(&self) -> f64 {
        self.value().unwrap_or(f64::NAN)
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, GrandTotal::Feasible { .. })
    }
}

/// Why a locked row does not hold its requested share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceCause {
    /// Score ≤ 0: no finite weight yields a positive share.
    ZeroScore,
    /// Solved weight exceeded WEIGHT_MAX.
    ClampedHigh,
    /// Solved weight fell below WEIGHT_MIN.
    ClampedLow,
    /// Lock set claims ≥ 100%; weight collapsed to 0.
    Infeasible,
    /// Own weight solved cleanly, but another row's clamp moved the total.
    KnockOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetDivergence {
    pub index: usize,
    pub requested: f64,
    pub realized: f64,
    pub cause: DivergenceCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub effective_weight: f64,
    pub weighted_score: f64,
    pub share_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub total: GrandTotal,
    /// Back-solved `U / (1 - L)` before clamping; `None` when infeasible.
    pub solved_total: Option<f64>,
    /// Sum of locked target shares (`L`).
    pub claimed_share: f64,
    pub rows: Vec<ReconciledRow>,
    divergences: Vec<TargetDivergence>,
}

impl Reconciliation {
    pub fn effective_weights(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.effective_weight).collect()
    }

    pub fn weighted_scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.weighted_score).collect()
    }

    pub fn shares(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.share_of_total).collect()
    }

    /// Locked rows whose realized share misses the requested one.
    pub fn divergences(&self) -> &[TargetDivergence] {
        &self.divergences
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input sequences differ in length: scores={scores}, locked={locked}, locked_share={locked_share}, free_weight={free_weight}")]
pub struct ShapeError {
    pub scores: usize,
    pub locked: usize,
    pub locked_share: usize,
    pub free_weight: usize,
}

/// Four-sequence form of [`reconcile`]. Lengths must match.
pub fn reconcile_parallel(
    scores: &[f64],
    locked: &[bool],
    locked_share: &[f64],
    free_weight: &[f64],
) -> Result<Reconciliation, ShapeError> {
    let n = scores.len();
    if locked.len() != n || locked_share.len() != n || free_weight.len() != n {
        return Err(ShapeError {
            scores: n,
            locked: locked.len(),
            locked_share: locked_share.len(),
            free_weight: free_weight.len(),
        });
    }

    let rows: Vec<CriterionInput> = (0..n)
        .map(|i| CriterionInput {
            score: scores[i],
            locked: locked[i],
            locked_share: locked_share[i],
            free_weight: free_weight[i],
        })
        .collect();
    Ok(reconcile(&rows))
}

/// Reconcile one set of inputs into a consistent weighting state.
pub fn reconcile(inputs: &[CriterionInput]) -> Reconciliation {
    // (1) Share already claimed by locks.
    let claimed: f64 = inputs
        .iter()
        .filter(|c| c.locked)
        .map(|c| c.locked_share)
        .sum();

    // (2) Raw unlocked contribution.
    let unlocked: f64 = inputs
        .iter()
        .filter(|c| !c.locked)
        .map(|c| c.score * clamp_weight(c.free_weight))
        .sum();

    // (3) Back-solve the total from the unclaimed fraction.
    let denom = 1.0 - claimed;
    let solved_total = if denom > 0.0 {
        Some(unlocked / denom)
    } else {
        None
    };

    // (4) + (5) Effective weights and weighted scores.
    let mut weights = Vec::with_capacity(inputs.len());
    let mut causes = Vec::with_capacity(inputs.len());
    for c in inputs {
        let (w, cause) = if c.locked {
            solve_locked(c, solved_total)
        } else {
            (clamp_weight(c.free_weight), None)
        };
        weights.push(w);
        causes.push(cause);
    }
    let weighted: Vec<f64> = inputs
        .iter()
        .zip(&weights)
        .map(|(c, w)| c.score * w)
        .collect();

    // (6) Realized total after clamping.
    let realized: f64 = weighted.iter().sum();
    let total = match solved_total {
        Some(_) => GrandTotal::Feasible { total: realized },
        None => GrandTotal::Infeasible { claimed },
    };

    // (7) Shares; all zero when the total is undefined or not positive.
    let share_base = total.value().filter(|t| *t > 0.0);
    let rows: Vec<ReconciledRow> = weights
        .iter()
        .zip(&weighted)
        .map(|(&effective_weight, &weighted_score)| ReconciledRow {
            effective_weight,
            weighted_score,
            share_of_total: share_base.map_or(0.0, |t| weighted_score / t),
        })
        .collect();

    let divergences = collect_divergences(inputs, &rows, &causes);

    Reconciliation {
        total,
        solved_total,
        claimed_share: claimed,
        rows,
        divergences,
    }
}

/// Weight that makes a locked row hold `locked_share` of `solved_total`,
/// clamped, plus the reason it may not.
fn solve_locked(c: &CriterionInput, solved_total: Option<f64>) -> (f64, Option<DivergenceCause>) {
    if c.score <= 0.0 {
        return (WEIGHT_MIN, Some(DivergenceCause::ZeroScore));
    }
    let total = match solved_total {
        Some(t) if t.is_finite() => t,
        _ => return (WEIGHT_MIN, Some(DivergenceCause::Infeasible)),
    };

    let ideal = (c.locked_share * total) / c.score;
    let w = clamp_weight(ideal);
    let cause = if ideal > WEIGHT_MAX {
        Some(DivergenceCause::ClampedHigh)
    } else if ideal < WEIGHT_MIN || ideal.is_nan() {
        Some(DivergenceCause::ClampedLow)
    } else {
        None
    };
    (w, cause)
}

fn collect_divergences(
    inputs: &[CriterionInput],
    rows: &[ReconciledRow],
    causes: &[Option<DivergenceCause>],
) -> Vec<TargetDivergence> {
    inputs
        .iter()
        .zip(rows)
        .zip(causes)
        .enumerate()
        .filter(|(_, ((c, _), _))| c.locked)
        .filter_map(|(index, ((c, row), cause))| {
            let gap = (row.share_of_total - c.locked_share).abs();
            // NaN gaps (non-finite targets) count as misses too.
            if gap <= SHARE_TOLERANCE {
                return None;
            }
            Some(TargetDivergence {
                index,
                requested: c.locked_share,
                realized: row.share_of_total,
                cause: cause.unwrap_or(DivergenceCause::KnockOn),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn clamp_weight_bounds() {
        assert_eq!(clamp_weight(15.0), 10.0);
        assert_eq!(clamp_weight(-3.0), 0.0);
        assert_eq!(clamp_weight(4.2), 4.2);
        assert_eq!(clamp_weight(f64::NAN), 0.0);
        assert_eq!(clamp_weight(f64::INFINITY), 10.0);
    }

    #[test]
    fn all_unlocked_uses_free_weights() {
        let r = reconcile(&[CriterionInput::free(10.0, 2.0), CriterionInput::free(30.0, 1.0)]);
        assert_eq!(r.effective_weights(), vec![2.0, 1.0]);
        assert_eq!(r.total, GrandTotal::Feasible { total: 50.0 });
        assert!(close(r.shares()[0], 0.4));
        assert!(close(r.shares()[1], 0.6));
        assert!(r.divergences().is_empty());
    }

    #[test]
    fn two_row_balance() {
        let r = reconcile(&[CriterionInput::locked(100.0, 0.25), CriterionInput::free(50.0, 4.0)]);
        let total = r.total.value().unwrap();
        assert!((total - 266.666_666_666).abs() < 1e-6);
        assert!((r.rows[0].effective_weight - 0.666_666_666).abs() < 1e-6);
        assert!(close(r.rows[0].share_of_total, 0.25));
        assert!(close(r.rows[1].share_of_total, 0.75));
        assert!(r.divergences().is_empty());
    }

    #[test]
    fn clamp_high_reports_divergence() {
        // Needs weight 90 to hold half of the total: clamps to 10.
        let r = reconcile(&[CriterionInput::locked(10.0, 0.5), CriterionInput::free(90.0, 10.0)]);
        assert_eq!(r.rows[0].effective_weight, 10.0);
        assert_eq!(r.divergences().len(), 1);
        assert_eq!(r.divergences()[0].cause, DivergenceCause::ClampedHigh);
        assert!(close(r.divergences()[0].realized, 0.1));
    }

    #[test]
    fn knock_on_divergence_for_cleanly_solved_row() {
        // Row 0 clamps; row 1 solves fine but the realized total shrinks.
        let r = reconcile(&[
            CriterionInput::locked(10.0, 0.5),
            CriterionInput::locked(100.0, 0.25),
            CriterionInput::free(100.0, 2.5),
        ]);
        let causes: Vec<_> = r.divergences().iter().map(|d| d.cause).collect();
        assert_eq!(causes, vec![DivergenceCause::ClampedHigh, DivergenceCause::KnockOn]);
    }

    #[test]
    fn negative_locked_share_clamps_low() {
        let r = reconcile(&[CriterionInput::locked(10.0, -0.2), CriterionInput::free(10.0, 1.0)]);
        assert_eq!(r.rows[0].effective_weight, 0.0);
        assert_eq!(r.divergences()[0].cause, DivergenceCause::ClampedLow);
    }

    #[test]
    fn infeasible_has_zero_shares_and_nan_sentinel() {
        let r = reconcile(&[
            CriterionInput::locked(10.0, 0.7),
            CriterionInput::locked(10.0, 0.3),
            CriterionInput::free(10.0, 5.0),
        ]);
        assert!(!r.total.is_feasible());
        assert!(r.total.as_f64().is_nan());
        assert_eq!(r.solved_total, None);
        assert_eq!(r.effective_weights(), vec![0.0, 0.0, 5.0]);
        assert!(r.shares().iter().all(|s| *s == 0.0));
        assert!(r
            .divergences()
            .iter()
            .all(|d| d.cause == DivergenceCause::Infeasible));
    }

    #[test]
    fn zero_total_gives_zero_shares() {
        let r = reconcile(&[CriterionInput::free(0.0, 5.0), CriterionInput::free(10.0, 0.0)]);
        assert_eq!(r.total, GrandTotal::Feasible { total: 0.0 });
        assert_eq!(r.shares(), vec![0.0, 0.0]);
    }

    #[test]
    fn negative_scores_are_arithmetic() {
        let r = reconcile(&[CriterionInput::free(-10.0, 1.0), CriterionInput::free(5.0, 1.0)]);
        assert_eq!(r.weighted_scores(), vec![-10.0, 5.0]);
        assert_eq!(r.total, GrandTotal::Feasible { total: -5.0 });
        assert_eq!(r.shares(), vec![0.0, 0.0]);
    }

    #[test]
    fn empty_input_is_feasible_zero() {
        let r = reconcile(&[]);
        assert_eq!(r.total, GrandTotal::Feasible { total: 0.0 });
        assert_eq!(r.solved_total, Some(0.0));
        assert!(r.rows.is_empty());
    }

    #[test]
    fn parallel_rejects_mismatched_lengths() {
        let err = reconcile_parallel(&[1.0, 2.0], &[false], &[0.0, 0.0], &[1.0, 1.0]).unwrap_err();
        assert_eq!(err.locked, 1);
        assert_eq!(err.scores, 2);
    }

    #[test]
    fn parallel_matches_row_form() {
        let a = reconcile_parallel(&[100.0, 50.0], &[true, false], &[0.25, 0.0], &[0.0, 4.0]).unwrap();
        let b = reconcile(&[CriterionInput::locked(100.0, 0.25), CriterionInput::free(50.0, 4.0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn grand_total_serializes_tagged() {
        let v = serde_json::to_value(GrandTotal::Infeasible { claimed: 1.1 }).unwrap();
        assert_eq!(v["status"], "infeasible");
        let v = serde_json::to_value(GrandTotal::Feasible { total: 3.0 }).unwrap();
        assert_eq!(v["status"], "feasible");
        assert_eq!(v["total"], 3.0);
    }
}
