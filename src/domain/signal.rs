//! Cross-sectional signal generation: momentum and mean reversion.
//!
//! On every rebalance date the valid symbols are ranked by the strategy
//! metric and the best `top_k` receive an equal-weight Buy. A date with
//! fewer than `top_k` valid symbols emits nothing.

use crate::domain::error::LabelTraderError;
use crate::domain::panel::{PricePanel, SymbolSeries};
use crate::domain::rebalance::{RebalanceFrequency, rebalance_dates};
use crate::domain::trade::TradeAction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LOOKBACK_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// `close / close[-lookback] - 1`, highest first.
    Momentum,
    /// `(close - SMA) / SMA`, most negative first.
    MeanReversion,
}

impl StrategyType {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyType::Momentum => "momentum",
            StrategyType::MeanReversion => "mean_reversion",
        }
    }

    fn prefers_high(&self) -> bool {
        matches!(self, StrategyType::Momentum)
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyType {
    type Err = LabelTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "momentum" => Ok(StrategyType::Momentum),
            "mean_reversion" | "mean-reversion" => Ok(StrategyType::MeanReversion),
            other => Err(LabelTraderError::invalid(format!(
                "unsupported strategy type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub lookback_period: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            lookback_period: DEFAULT_LOOKBACK_PERIOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub weight: f64,
    pub reference_price: f64,
}

/// Metric per bar of one symbol; `None` until enough history exists or when
/// the value is not finite.
fn strategy_metric(series: &SymbolSeries, strategy: StrategyType, lookback: usize) -> Vec<Option<f64>> {
    let closes = series.closes();
    let finite = |v: f64| v.is_finite().then_some(v);

    match strategy {
        StrategyType::Momentum => (0..closes.len())
            .map(|i| {
                if i < lookback {
                    return None;
                }
                finite(closes[i] / closes[i - lookback] - 1.0)
            })
            .collect(),
        StrategyType::MeanReversion => (0..closes.len())
            .map(|i| {
                if i + 1 < lookback {
                    return None;
                }
                let window = &closes[i + 1 - lookback..=i];
                let sma = window.iter().sum::<f64>() / lookback as f64;
                finite((closes[i] - sma) / sma)
            })
            .collect(),
    }
}

pub fn generate_signals(
    panel: &PricePanel,
    strategy: StrategyType,
    frequency: RebalanceFrequency,
    top_k: usize,
    params: &StrategyParams,
) -> Result<Vec<Signal>, LabelTraderError> {
    if top_k == 0 {
        return Err(LabelTraderError::invalid("top_k must be at least 1"));
    }
    if params.lookback_period == 0 {
        return Err(LabelTraderError::invalid("lookback_period must be at least 1"));
    }

    let metrics: BTreeMap<&str, (&SymbolSeries, Vec<Option<f64>>)> = panel
        .iter_series()
        .map(|s| {
            (
                s.symbol.as_str(),
                (s, strategy_metric(s, strategy, params.lookback_period)),
            )
        })
        .collect();

    let weight = 1.0 / top_k as f64;
    let mut signals = Vec::new();

    for date in rebalance_dates(panel.timeline(), frequency) {
        let mut candidates: Vec<(&str, f64, f64)> = metrics
            .iter()
            .filter_map(|(&symbol, (series, values))| {
                let idx = series.get_bar_index(date)?;
                let metric = values[idx]?;
                Some((symbol, metric, series.bars[idx].close))
            })
            .collect();

        if candidates.len() < top_k {
            continue;
        }

        candidates.sort_by(|a, b| {
            let by_metric = if strategy.prefers_high() {
                b.1.partial_cmp(&a.1)
            } else {
                a.1.partial_cmp(&b.1)
            };
            by_metric.unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0))
        });

        signals.extend(candidates.into_iter().take(top_k).map(|(symbol, _, close)| Signal {
            date,
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            weight,
            reference_price: close,
        }));
    }

    Ok(signals)
}
