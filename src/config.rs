// src/config.rs
//! Balancer configuration (TOML) with env overrides.
//!
//! Lookup order for the file:
//! 1) $BALANCER_CONFIG_PATH
//! 2) config/balancer.toml
//! 3) built-in defaults (file missing)
//!
//! `BALANCER_LOCK_CEILING` overrides `lock_ceiling` after the file is read.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/balancer.toml";
pub const ENV_CONFIG_PATH: &str = "BALANCER_CONFIG_PATH";
pub const ENV_LOCK_CEILING: &str = "BALANCER_LOCK_CEILING";

fn default_criteria() -> usize {
    5
}
fn default_min_criteria() -> usize {
    2
}
fn default_max_criteria() -> usize {
    20
}
fn default_max_score() -> u32 {
    200
}
fn default_weight() -> f64 {
    1.0
}
fn default_weight_step() -> f64 {
    0.1
}
fn default_lock_ceiling() -> f64 {
    0.999_999
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Rows on a freshly generated board.
    #[serde(default = "default_criteria")]
    pub default_criteria: usize,
    #[serde(default = "default_min_criteria")]
    pub min_criteria: usize,
    #[serde(default = "default_max_criteria")]
    pub max_criteria: usize,
    /// Generated scores are integers in 0..=max_score.
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    /// Slider value for rows nobody has touched yet.
    #[serde(default = "default_weight")]
    pub default_weight: f64,
    #[serde(default = "default_weight_step")]
    pub weight_step: f64,
    /// A lock is refused once the prospective locked total reaches this.
    /// Slightly under 1.0 to absorb float error.
    #[serde(default = "default_lock_ceiling")]
    pub lock_ceiling: f64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            default_criteria: default_criteria(),
            min_criteria: default_min_criteria(),
            max_criteria: default_max_criteria(),
            max_score: default_max_score(),
            default_weight: default_weight(),
            weight_step: default_weight_step(),
            lock_ceiling: default_lock_ceiling(),
        }
    }
}

impl BalancerConfig {
    /// Env path → default path → defaults, then env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::debug!(target: "balancer", path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if let Some(c) = parse_ceiling_env(std::env::var(ENV_LOCK_CEILING).ok()) {
            cfg.lock_ceiling = c;
        }
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading balancer config from {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("parsing balancer config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BalancerConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    /// Repair out-of-domain values instead of failing.
    pub fn sanitized(mut self) -> Self {
        if self.min_criteria == 0 {
            self.min_criteria = 1;
        }
        if self.min_criteria > self.max_criteria {
            std::mem::swap(&mut self.min_criteria, &mut self.max_criteria);
        }
        self.default_criteria = self
            .default_criteria
            .clamp(self.min_criteria, self.max_criteria);

        if !self.default_weight.is_finite() {
            self.default_weight = default_weight();
        }
        self.default_weight = crate::reconcile::clamp_weight(self.default_weight);

        if !(self.weight_step.is_finite() && self.weight_step > 0.0) {
            self.weight_step = default_weight_step();
        }
        if !(self.lock_ceiling > 0.0 && self.lock_ceiling <= 1.0) {
            self.lock_ceiling = default_lock_ceiling();
        }
        self
    }

    /// Clamp a requested board size into the configured range.
    pub fn clamp_criteria(&self, n: usize) -> usize {
        n.clamp(self.min_criteria, self.max_criteria)
    }
}

// parse optional float env and keep it inside (0.0..=1.0>
fn parse_ceiling_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.min(1.0))
}
