//! # Board
//! Caller-owned balancer state: scores, lock flags, locked targets and slider
//! weights as parallel vectors.
//!
//! The board is a plain value. Every edit is a method on `&mut Board`, and
//! every displayed number comes from a fresh [`reconcile`] call, so the board
//! can round-trip through JSON between requests with nothing kept server-side.
//!
//! Lock rules enforced here (the core only absorbs violations):
//! - a zero-score row cannot be locked at a positive share,
//! - the locked shares together must stay under `lock_ceiling`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BalancerConfig;
use crate::reconcile::{
    clamp_weight, reconcile, CriterionInput, GrandTotal, Reconciliation, TargetDivergence,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoardError {
    #[error("row {index} does not exist (board has {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("row {index} is locked; unlock it before moving its weight")]
    RowLocked { index: usize },
    #[error("cannot lock row {index} at a nonzero share because its score is 0")]
    ZeroScore { index: usize },
    #[error("total locked share must stay under 100% (would be {:.2}%)", .prospective * 100.0)]
    OverCommitted { index: usize, prospective: f64 },
    #[error("board vectors differ in length: scores={scores}, locked={locked}, locked_share={locked_share}, weights={weights}")]
    Shape {
        scores: usize,
        locked: usize,
        locked_share: usize,
        weights: usize,
    },
}

impl BoardError {
    /// Short machine-readable tag (metrics label, JSON `code`).
    pub fn code(&self) -> &'static str {
        match self {
            BoardError::IndexOutOfRange { .. } => "index_out_of_range",
            BoardError::RowLocked { .. } => "row_locked",
            BoardError::ZeroScore { .. } => "zero_score",
            BoardError::OverCommitted { .. } => "over_committed",
            BoardError::Shape { .. } => "shape",
        }
    }

    /// Lock-rule violations, as opposed to malformed requests.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            BoardError::RowLocked { .. }
                | BoardError::ZeroScore { .. }
                | BoardError::OverCommitted { .. }
        )
    }
}

/// Outcome of [`Board::toggle_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum LockChange {
    Locked { share: f64 },
    Unlocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub scores: Vec<f64>,
    pub locked: Vec<bool>,
    /// Target share per row; 0 for unlocked rows.
    pub locked_share: Vec<f64>,
    /// Slider values; ignored by reconciliation while a row is locked.
    pub weights: Vec<f64>,
}

impl Board {
    /// Fresh board with random integer scores, no locks, default weights.
    pub fn generate<R: Rng>(n: usize, cfg: &BalancerConfig, rng: &mut R) -> Self {
        let n = cfg.clamp_criteria(n);
        let scores = (0..n)
            .map(|_| f64::from(rng.random_range(0..=cfg.max_score)))
            .collect();
        Self::with_scores(scores, cfg)
    }

    pub fn with_scores(scores: Vec<f64>, cfg: &BalancerConfig) -> Self {
        let n = scores.len();
        Self {
            scores,
            locked: vec![false; n],
            locked_share: vec![0.0; n],
            weights: vec![cfg.default_weight; n],
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn name(index: usize) -> String {
        format!("Criteria {}", index + 1)
    }

    /// Regenerate only when the requested size differs from the current one.
    pub fn ensure_size<R: Rng>(&mut self, n: usize, cfg: &BalancerConfig, rng: &mut R) {
        let n = cfg.clamp_criteria(n);
        if self.len() != n {
            *self = Self::generate(n, cfg, rng);
        }
    }

    /// New scores, locks and weights reset.
    pub fn regenerate<R: Rng>(&mut self, cfg: &BalancerConfig, rng: &mut R) {
        *self = Self::generate(self.len(), cfg, rng);
        debug!(target: "balancer", rows = self.len(), "board regenerated");
    }

    pub fn reset_locks(&mut self) {
        self.locked.iter_mut().for_each(|l| *l = false);
        self.locked_share.iter_mut().for_each(|s| *s = 0.0);
        debug!(target: "balancer", "locks reset");
    }

    /// Shape check for boards that arrive from outside.
    pub fn validate(&self) -> Result<(), BoardError> {
        let n = self.scores.len();
        if self.locked.len() != n || self.locked_share.len() != n || self.weights.len() != n {
            return Err(BoardError::Shape {
                scores: n,
                locked: self.locked.len(),
                locked_share: self.locked_share.len(),
                weights: self.weights.len(),
            });
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), BoardError> {
        if index >= self.len() {
            return Err(BoardError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Move a slider. Snaps to `weight_step`, then clamps to the slider range.
    pub fn set_weight(
        &mut self,
        index: usize,
        weight: f64,
        cfg: &BalancerConfig,
    ) -> Result<f64, BoardError> {
        self.check_index(index)?;
        if self.locked[index] {
            return Err(BoardError::RowLocked { index });
        }
        let snapped = clamp_weight((weight / cfg.weight_step).round() * cfg.weight_step);
        self.weights[index] = snapped;
        debug!(target: "balancer", index, requested = weight, weight = snapped, "weight set");
        Ok(snapped)
    }

    /// Lock the row at its current share, or unlock it.
    pub fn toggle_lock(
        &mut self,
        index: usize,
        cfg: &BalancerConfig,
    ) -> Result<LockChange, BoardError> {
        self.check_index(index)?;
        if self.locked[index] {
            self.locked[index] = false;
            self.locked_share[index] = 0.0;
            debug!(target: "balancer", index, "row unlocked");
            return Ok(LockChange::Unlocked);
        }
        self.try_lock(index, cfg)
    }

    fn try_lock(&mut self, index: usize, cfg: &BalancerConfig) -> Result<LockChange, BoardError> {
        let current = self.reconcile().rows[index].share_of_total;
        let share = if current.is_finite() { current } else { 0.0 };

        if self.scores[index] == 0.0 && share > 0.0 {
            info!(target: "balancer", index, "lock refused: zero score");
            return Err(BoardError::ZeroScore { index });
        }

        let prospective = self.locked_share_total() + share;
        if prospective >= cfg.lock_ceiling {
            info!(target: "balancer", index, prospective, "lock refused: over-committed");
            return Err(BoardError::OverCommitted { index, prospective });
        }

        self.locked[index] = true;
        self.locked_share[index] = share;
        debug!(target: "balancer", index, share, "row locked");
        Ok(LockChange::Locked { share })
    }

    /// Sum of targets over locked rows.
    pub fn locked_share_total(&self) -> f64 {
        self.locked
            .iter()
            .zip(&self.locked_share)
            .filter(|(l, _)| **l)
            .map(|(_, s)| *s)
            .sum()
    }

    pub fn inputs(&self) -> Vec<CriterionInput> {
        (0..self.len())
            .map(|i| CriterionInput {
                score: self.scores[i],
                locked: self.locked[i],
                locked_share: self.locked_share[i],
                free_weight: self.weights[i],
            })
            .collect()
    }

    pub fn reconcile(&self) -> Reconciliation {
        reconcile(&self.inputs())
    }

    /// Unweighted share of each score in the score total.
    pub fn score_shares(&self) -> Vec<f64> {
        let total: f64 = self.scores.iter().sum();
        self.scores
            .iter()
            .map(|s| if total > 0.0 { s / total } else { 0.0 })
            .collect()
    }

    /// Everything a table needs, recomputed from scratch.
    pub fn view(&self) -> BoardView {
        let rec = self.reconcile();
        let score_shares = self.score_shares();

        let rows: Vec<RowView> = rec
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| RowView {
                index: i,
                name: Self::name(i),
                score: self.scores[i],
                score_share: score_shares[i],
                weight: r.effective_weight,
                locked: self.locked[i],
                locked_share: self.locked[i].then_some(self.locked_share[i]),
                weighted_score: r.weighted_score,
                share: r.share_of_total,
            })
            .collect();

        let locked_share_total = self.locked_share_total();
        let totals = Totals {
            total_score: self.scores.iter().sum(),
            score_share_sum: score_shares.iter().sum(),
            weighted_total: rec.total,
            share_sum: rows.iter().map(|r| r.share).sum(),
            locked_rows: (0..self.len()).filter(|&i| self.locked[i]).collect(),
            locked_share_total,
            over_committed: locked_share_total >= 1.0,
        };

        BoardView {
            rows,
            totals,
            divergences: rec.divergences().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub index: usize,
    pub name: String,
    pub score: f64,
    pub score_share: f64,
    /// Effective weight (solved for locked rows).
    pub weight: f64,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_share: Option<f64>,
    pub weighted_score: f64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_score: f64,
    pub score_share_sum: f64,
    pub weighted_total: GrandTotal,
    pub share_sum: f64,
    pub locked_rows: Vec<usize>,
    pub locked_share_total: f64,
    /// Locked targets reach 100%: the state cannot be solved.
    pub over_committed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub rows: Vec<RowView>,
    pub totals: Totals,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub divergences: Vec<TargetDivergence>,
}
