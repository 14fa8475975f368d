//! Performance metrics over the daily portfolio states and the trade ledger.

use super::portfolio::PortfolioState;
use super::trade::{RoundTrip, Trade, pair_round_trips};
use serde::{Deserialize, Serialize};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub calmar_ratio: f64,
    pub total_trades: usize,
    pub round_trips: usize,
    pub win_rate: f64,
    /// Mean `return_pct` of the round trips.
    pub avg_trade_return: f64,
}

impl Metrics {
    pub fn compute(states: &[PortfolioState], trades: &[Trade]) -> Self {
        let round_trips = pair_round_trips(trades);
        Self::from_parts(states, trades.len(), &round_trips)
    }

    pub fn from_parts(states: &[PortfolioState], total_trades: usize, round_trips: &[RoundTrip]) -> Self {
        let total_return = states.last().map_or(0.0, |s| s.cumulative_return);
        let annual_return = annualize(total_return, states.len());
        let max_drawdown = compute_max_drawdown(states);
        let sharpe_ratio = compute_sharpe(states);

        let calmar_ratio = if max_drawdown > 0.0 {
            annual_return / max_drawdown
        } else {
            0.0
        };

        let (win_rate, avg_trade_return) = if round_trips.is_empty() {
            (0.0, 0.0)
        } else {
            let n = round_trips.len() as f64;
            let wins = round_trips.iter().filter(|t| t.is_win()).count() as f64;
            let mean_return = round_trips.iter().map(|t| t.return_pct).sum::<f64>() / n;
            (wins / n, mean_return)
        };

        Metrics {
            total_return,
            annual_return,
            max_drawdown,
            sharpe_ratio,
            calmar_ratio,
            total_trades,
            round_trips: round_trips.len(),
            win_rate,
            avg_trade_return,
        }
    }
}

fn annualize(total_return: f64, days: usize) -> f64 {
    if days == 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / days as f64) - 1.0
}

fn compute_max_drawdown(states: &[PortfolioState]) -> f64 {
    let Some(first) = states.first() else {
        return 0.0;
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    for state in states {
        if state.total_value > peak {
            peak = state.total_value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - state.total_value) / peak);
        }
    }
    max_dd
}

/// Population standard deviation of the first differences of cumulative return.
fn compute_sharpe(states: &[PortfolioState]) -> f64 {
    if states.len() < 2 {
        return 0.0;
    }

    let deltas: Vec<f64> = states
        .windows(2)
        .map(|w| w[1].cumulative_return - w[0].cumulative_return)
        .collect();

    let n = deltas.len() as f64;
    let mean = deltas.iter().sum::<f64>() / n;
    let variance = deltas.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 && stddev.is_finite() {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}
