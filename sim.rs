//! Headless batch runs.
//!
//! Plays many independently seeded sessions with no player input and summarizes
//! where each asset ended up. Useful for tuning volatility and event tables
//! before putting a board in front of players.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::EngineResult;
use crate::session::SessionState;

// ─── Single run ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct SessionRun {
    pub seed: u64,
    /// (asset, initial price, final price), board order
    pub final_prices: Vec<(String, f64, f64)>,
    pub events_fired: usize,
    pub compoundings: usize,
}

/// Run one session for `ticks` ticks with the given seed.
pub fn run_session(config: &SessionConfig, seed: u64, ticks: usize) -> EngineResult<SessionRun> {
    let mut session = SessionState::initialize(config.clone().with_seed(seed))?;
    session.start();

    let mut events_fired = 0;
    let mut compoundings = 0;
    for _ in 0..ticks {
        if let Some(report) = session.tick() {
            events_fired += usize::from(report.event.is_some());
            compoundings += usize::from(report.compounded);
        }
    }

    let final_prices = config
        .assets
        .iter()
        .map(|a| {
            let last = session.price_of(&a.name).unwrap_or(a.initial_price);
            (a.name.clone(), a.initial_price, last)
        })
        .collect();

    Ok(SessionRun {
        seed,
        final_prices,
        events_fired,
        compoundings,
    })
}

// ─── Batch ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetOutcome {
    pub asset: String,
    pub initial_price: f64,
    pub mean_final: f64,
    pub std_final: f64,
    pub min_final: f64,
    pub max_final: f64,
    /// mean(final / initial) - 1
    pub mean_return: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub sessions: usize,
    pub ticks: usize,
    pub mean_events: f64,
    pub assets: Vec<AssetOutcome>,
}

/// Run `n_sessions` sessions in parallel, seeds `seed_start..seed_start + n`.
pub fn run_batch(
    config: &SessionConfig,
    n_sessions: usize,
    ticks: usize,
    seed_start: u64,
) -> EngineResult<BatchReport> {
    // fail once, up front, instead of in every worker
    config.validate()?;

    let runs: Vec<SessionRun> = (0..n_sessions)
        .into_par_iter()
        .map(|i| run_session(config, seed_start + i as u64, ticks))
        .collect::<EngineResult<Vec<_>>>()?;

    let report = aggregate_runs(&runs, ticks);
    info!(
        sessions = report.sessions,
        ticks,
        mean_events = report.mean_events,
        "batch complete"
    );
    Ok(report)
}

fn aggregate_runs(runs: &[SessionRun], ticks: usize) -> BatchReport {
    if runs.is_empty() {
        return BatchReport {
            sessions: 0,
            ticks,
            mean_events: 0.0,
            assets: vec![],
        };
    }
    let n = runs.len() as f64;
    let n_assets = runs[0].final_prices.len();

    let assets = (0..n_assets)
        .map(|i| {
            let (name, initial, _) = &runs[0].final_prices[i];
            let finals: Vec<f64> = runs.iter().map(|r| r.final_prices[i].2).collect();

            let mean = finals.iter().sum::<f64>() / n;
            let var = finals.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n;
            let min = finals.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = finals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean_return = finals.iter().map(|f| f / initial - 1.0).sum::<f64>() / n;

            AssetOutcome {
                asset: name.clone(),
                initial_price: *initial,
                mean_final: mean,
                std_final: var.sqrt(),
                min_final: min,
                max_final: max,
                mean_return,
            }
        })
        .collect();

    BatchReport {
        sessions: runs.len(),
        ticks,
        mean_events: runs.iter().map(|r| r.events_fired as f64).sum::<f64>() / n,
        assets,
    }
}
