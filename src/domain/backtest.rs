//! Backtest orchestration: label members → price panel → signals → simulation → metrics.

use crate::domain::error::LabelTraderError;
use crate::domain::metrics::Metrics;
use crate::domain::panel::PricePanel;
use crate::domain::portfolio::{EquityPoint, PortfolioState};
use crate::domain::rebalance::RebalanceFrequency;
use crate::domain::signal::{StrategyParams, StrategyType, generate_signals};
use crate::domain::simulator::simulate;
use crate::domain::trade::{RoundTrip, Trade, pair_round_trips};
use crate::domain::universe::load_label_universe;
use crate::ports::label_port::LabelPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub label_name: String,
    pub strategy_type: StrategyType,
    pub rebalance_frequency: RebalanceFrequency,
    pub top_k: usize,
    pub lookback_period: usize,
    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub result_id: String,
    pub strategy_type: StrategyType,
    pub label_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub rebalance_frequency: RebalanceFrequency,
    pub top_k: usize,
    pub metrics: Metrics,
    pub equity_curve: Vec<EquityPoint>,
    pub daily_states: Vec<PortfolioState>,
    pub trades: Vec<Trade>,
    pub round_trips: Vec<RoundTrip>,
}

impl BacktestResult {
    pub fn final_value(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.value)
    }
}

/// BLAKE3 over the configuration, equity curve and trade ledger.
pub fn result_id(
    config: &BacktestConfig,
    equity_curve: &[EquityPoint],
    trades: &[Trade],
) -> Result<String, LabelTraderError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(config)?);
    hasher.update(&serde_json::to_vec(equity_curve)?);
    hasher.update(&serde_json::to_vec(trades)?);
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn run_backtest(
    prices: &dyn PricePort,
    labels: &dyn LabelPort,
    config: &BacktestConfig,
) -> Result<BacktestResult, LabelTraderError> {
    if config.start_date > config.end_date {
        return Err(LabelTraderError::invalid(format!(
            "start_date {} is after end_date {}",
            config.start_date, config.end_date
        )));
    }

    let universe = load_label_universe(labels, &config.label_name)?;
    let bars = prices.fetch_prices(&universe, config.start_date, config.end_date)?;
    if bars.is_empty() {
        return Err(LabelTraderError::insufficient(format!(
            "no price data for label {} between {} and {}",
            config.label_name, config.start_date, config.end_date
        )));
    }

    let panel = PricePanel::from_bars(bars);
    info!(
        label = %config.label_name,
        symbols = panel.symbol_count(),
        dates = panel.timeline().len(),
        "price panel loaded"
    );

    let params = StrategyParams {
        lookback_period: config.lookback_period,
    };
    let signals = generate_signals(
        &panel,
        config.strategy_type,
        config.rebalance_frequency,
        config.top_k,
        &params,
    )?;
    let (daily_states, trades) = simulate(&panel, &signals, config.initial_capital)?;

    let round_trips = pair_round_trips(&trades);
    let metrics = Metrics::from_parts(&daily_states, trades.len(), &round_trips);
    let equity_curve: Vec<EquityPoint> = daily_states.iter().map(EquityPoint::from).collect();
    let id = result_id(config, &equity_curve, &trades)?;

    info!(
        result_id = %id,
        signals = signals.len(),
        trades = trades.len(),
        total_return = metrics.total_return,
        "backtest finished"
    );

    Ok(BacktestResult {
        result_id: id,
        strategy_type: config.strategy_type,
        label_name: config.label_name.clone(),
        start_date: config.start_date,
        end_date: config.end_date,
        initial_capital: config.initial_capital,
        rebalance_frequency: config.rebalance_frequency,
        top_k: config.top_k,
        metrics,
        equity_curve,
        daily_states,
        trades,
        round_trips,
    })
}
