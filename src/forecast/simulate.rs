//! Recursive point path and residual-bootstrap ensemble.
//!
//! A path is rolled forward one day at a time:
//!
//! ```text
//! y[t]  = y[t-1] + f(x_t) + ε_t
//! e[t]  = α y[t] + (1 - α) e[t-1]            (momentum state)
//! x_t   = (y[t-1], squash(e[t-1] - e[t-2]), exogenous_t)
//! ```
//!
//! The point path uses `ε_t = 0`. Ensemble members draw `ε_t` with
//! replacement from the fitted model's in-sample residuals, plus a small
//! uniform jitter. Every member owns an RNG seeded from `(seed, member)`, so
//! the parallel ensemble is identical to a sequential run.

use chrono::NaiveDate;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::domain::{BandRow, Ensemble, EngineConfig};
use crate::error::EngineError;
use crate::features::{Exogenous, FeatureRow, FeatureTable, exogenous_at, squash_momentum};
use crate::fit::FittedModel;
use crate::forecast::horizon::Horizon;
use crate::math::{ewm_alpha, percentile_sorted, sort_floats};
use crate::panel::Panel;

/// Percentiles reported per horizon day.
pub const BAND_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Seed for one ensemble member.
pub fn member_seed(seed: u64, member: usize) -> u64 {
    seed ^ (member as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Run `paths` independent members in parallel, in member order.
pub fn run_ensemble<F>(paths: usize, seed: u64, member: F) -> Ensemble
where
    F: Fn(&mut StdRng) -> Vec<f64> + Sync,
{
    let paths = (0..paths)
        .into_par_iter()
        .map(|m| {
            let mut rng = StdRng::seed_from_u64(member_seed(seed, m));
            member(&mut rng)
        })
        .collect();
    Ensemble { paths }
}

/// Shocks drawn with replacement, optionally smoothed by uniform jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualPool {
    values: Vec<f64>,
    jitter: f64,
}

impl ResidualPool {
    /// Fails with `DegenerateResidualSet` when no finite residual is available.
    pub fn new(residuals: &[f64], jitter: f64) -> Result<Self, EngineError> {
        let values: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        if values.is_empty() {
            return Err(EngineError::DegenerateResidualSet);
        }
        Ok(Self { values, jitter })
    }

    /// Like `new`, but an empty set is replaced by a single zero shock.
    pub fn or_zero(residuals: &[f64], jitter: f64) -> Self {
        match Self::new(residuals, jitter) {
            Ok(pool) => pool,
            Err(err) => {
                tracing::warn!(%err, "Bootstrapping from a zero residual");
                Self {
                    values: vec![0.0],
                    jitter,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        let base = self.values[rng.gen_range(0..self.values.len())];
        if self.jitter > 0.0 {
            base + rng.gen_range(-self.jitter..=self.jitter)
        } else {
            base
        }
    }
}

/// Target level and momentum state at the last confirmed day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathState {
    pub level: f64,
    /// `e[t-1]`
    pub ewm_last: f64,
    /// `e[t-2]`
    pub ewm_prev: f64,
}

/// Everything a path needs that does not depend on the shocks.
#[derive(Debug, Clone)]
pub struct PathModel<'a> {
    pub model: &'a FittedModel,
    pub exogenous: Vec<Exogenous>,
    pub start: PathState,
    pub alpha: f64,
    pub max_daily_move: f64,
}

impl PathModel<'_> {
    pub fn path(&self, mut shock: impl FnMut() -> f64) -> Vec<f64> {
        let mut state = self.start;
        let mut out = Vec::with_capacity(self.exogenous.len());
        for exo in &self.exogenous {
            let row = FeatureRow {
                target_lag1: state.level,
                momentum: squash_momentum(state.ewm_last - state.ewm_prev, self.max_daily_move),
                exo: *exo,
            };
            let level = state.level + self.model.predict_change(&row) + shock();
            let ewm = self.alpha * level + (1.0 - self.alpha) * state.ewm_last;
            state = PathState {
                level,
                ewm_last: ewm,
                ewm_prev: state.ewm_last,
            };
            out.push(level);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub dates: Vec<NaiveDate>,
    pub point: Vec<f64>,
    pub ensemble: Ensemble,
    pub bands: Vec<BandRow>,
    pub residual_count: usize,
    pub substitutions: usize,
}

/// Simulate the point path and the ensemble over `horizon`.
pub fn simulate(
    panel: &Panel,
    features: &FeatureTable,
    model: &FittedModel,
    horizon: &Horizon,
    config: &EngineConfig,
) -> Result<Simulation, EngineError> {
    let last = panel
        .last_confirmed_index()
        .ok_or_else(|| EngineError::insufficient("no confirmed target observation"))?;

    let start = PathState {
        level: panel.target[last],
        ewm_last: features.target_ewm[last],
        ewm_prev: features.target_ewm[last.saturating_sub(1)],
    };

    let dates = horizon.dates();
    let mut substitutions = 0usize;
    let exogenous: Vec<Exogenous> = dates
        .iter()
        .map(|d| exogenous_at(panel, &config.features, *d, &mut substitutions))
        .collect();

    let path_model = PathModel {
        model,
        exogenous,
        start,
        alpha: ewm_alpha(config.features.momentum_span),
        max_daily_move: config.features.max_daily_move,
    };

    let point = path_model.path(|| 0.0);

    let pool = ResidualPool::or_zero(&model.residuals, config.simulation.residual_jitter);
    let ensemble = run_ensemble(config.simulation.paths, config.simulation.seed, |rng| {
        path_model.path(|| pool.draw(rng))
    });
    let bands = ensemble_bands(&dates, &ensemble);

    tracing::info!(
        days = dates.len(),
        paths = ensemble.len(),
        residuals = pool.len(),
        "Simulated forecast ensemble"
    );

    Ok(Simulation {
        dates,
        point,
        ensemble,
        bands,
        residual_count: model.residuals.len(),
        substitutions,
    })
}

/// Per-day percentile bands of the ensemble.
pub fn ensemble_bands(dates: &[NaiveDate], ensemble: &Ensemble) -> Vec<BandRow> {
    dates
        .iter()
        .enumerate()
        .filter_map(|(day, date)| {
            let mut values = ensemble.day_values(day);
            sort_floats(&mut values);
            let q = |p: f64| percentile_sorted(&values, p);
            Some(BandRow {
                date: *date,
                p5: q(BAND_PERCENTILES[0])?,
                p25: q(BAND_PERCENTILES[1])?,
                median: q(BAND_PERCENTILES[2])?,
                p75: q(BAND_PERCENTILES[3])?,
                p95: q(BAND_PERCENTILES[4])?,
            })
        })
        .collect()
}
