//! Configuration validation.
//!
//! Turns the `[label]` and `[backtest]` INI sections into typed requests,
//! with command-line overrides applied first. Every problem is reported
//! against the section and key it came from before any run starts.

use crate::domain::backtest::{BacktestConfig, DEFAULT_INITIAL_CAPITAL};
use crate::domain::error::LabelTraderError;
use crate::domain::label::{DEFAULT_TOP_K, LabelParams, RankingRule};
use crate::domain::ranking::LabelRequest;
use crate::domain::rebalance::RebalanceFrequency;
use crate::domain::signal::{DEFAULT_LOOKBACK_PERIOD, StrategyType};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Command-line values that take precedence over the `[label]` section.
#[derive(Debug, Clone, Default)]
pub struct LabelOverrides {
    pub rule: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub top_k: Option<usize>,
    pub min_market_cap: Option<f64>,
}

/// Command-line values that take precedence over the `[backtest]` section.
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    pub label: Option<String>,
}

pub fn validate_label_config(config: &dyn ConfigPort) -> Result<(), LabelTraderError> {
    label_request_from_config(config, &LabelOverrides::default(), "validate").map(|_| ())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), LabelTraderError> {
    backtest_config_from_config(config, &BacktestOverrides::default()).map(|_| ())
}

pub fn label_request_from_config(
    config: &dyn ConfigPort,
    overrides: &LabelOverrides,
    task_id: &str,
) -> Result<LabelRequest, LabelTraderError> {
    const SECTION: &str = "label";

    let rule_str = required(config, SECTION, "rule", overrides.rule.clone())?;
    let rule: RankingRule = rule_str
        .parse()
        .map_err(|e: LabelTraderError| invalid(SECTION, "rule", e.to_string()))?;

    let start_date = date_value(config, SECTION, "start_date", overrides.start_date.clone())?;
    let end_date = date_value(config, SECTION, "end_date", overrides.end_date.clone())?;
    check_date_order(SECTION, start_date, end_date)?;

    let top_k = match overrides.top_k {
        Some(k) => k as i64,
        None => config.get_int(SECTION, "top_k", DEFAULT_TOP_K as i64),
    };
    if top_k < 1 {
        return Err(invalid(SECTION, "top_k", "top_k must be at least 1"));
    }

    let min_market_cap = overrides
        .min_market_cap
        .unwrap_or_else(|| config.get_double(SECTION, "min_market_cap", 0.0));
    if !min_market_cap.is_finite() || min_market_cap < 0.0 {
        return Err(invalid(
            SECTION,
            "min_market_cap",
            "min_market_cap must be non-negative",
        ));
    }

    Ok(LabelRequest {
        rule,
        start_date,
        end_date,
        params: LabelParams {
            top_k: top_k as usize,
            min_market_cap,
        },
        task_id: task_id.to_string(),
    })
}

pub fn backtest_config_from_config(
    config: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<BacktestConfig, LabelTraderError> {
    const SECTION: &str = "backtest";

    let label_name = required(config, SECTION, "label", overrides.label.clone())?;

    let strategy_type: StrategyType = config
        .get_string(SECTION, "strategy")
        .unwrap_or_else(|| "momentum".to_string())
        .parse()
        .map_err(|e: LabelTraderError| invalid(SECTION, "strategy", e.to_string()))?;

    let rebalance_frequency: RebalanceFrequency = config
        .get_string(SECTION, "rebalance")
        .unwrap_or_else(|| "monthly".to_string())
        .parse()
        .map_err(|e: LabelTraderError| invalid(SECTION, "rebalance", e.to_string()))?;

    let top_k = config.get_int(SECTION, "top_k", DEFAULT_TOP_K as i64);
    if top_k < 1 {
        return Err(invalid(SECTION, "top_k", "top_k must be at least 1"));
    }

    let lookback_period = config.get_int(SECTION, "lookback_period", DEFAULT_LOOKBACK_PERIOD as i64);
    if lookback_period < 1 {
        return Err(invalid(
            SECTION,
            "lookback_period",
            "lookback_period must be at least 1",
        ));
    }

    let initial_capital = config.get_double(SECTION, "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(invalid(
            SECTION,
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let start_date = date_value(config, SECTION, "start_date", None)?;
    let end_date = date_value(config, SECTION, "end_date", None)?;
    check_date_order(SECTION, start_date, end_date)?;

    Ok(BacktestConfig {
        label_name,
        strategy_type,
        rebalance_frequency,
        top_k: top_k as usize,
        lookback_period: lookback_period as usize,
        initial_capital,
        start_date,
        end_date,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> LabelTraderError {
    LabelTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    override_value: Option<String>,
) -> Result<String, LabelTraderError> {
    match override_value.or_else(|| config.get_string(section, key)) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(LabelTraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn date_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    override_value: Option<String>,
) -> Result<NaiveDate, LabelTraderError> {
    let raw = required(config, section, key, override_value)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD")))
}

fn check_date_order(section: &str, start: NaiveDate, end: NaiveDate) -> Result<(), LabelTraderError> {
    if start > end {
        return Err(invalid(
            section,
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}
