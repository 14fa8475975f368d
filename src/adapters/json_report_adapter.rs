//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::LabelTraderError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::EquityPoint;
use crate::domain::rebalance::RebalanceFrequency;
use crate::domain::signal::StrategyType;
use crate::domain::trade::{RoundTrip, Trade};
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;

#[derive(Serialize)]
struct JsonReport<'a> {
    result_id: &'a str,
    strategy_type: StrategyType,
    label_name: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    initial_capital: f64,
    rebalance_frequency: RebalanceFrequency,
    top_k: usize,
    final_value: f64,
    metrics: &'a Metrics,
    equity_curve: &'a [EquityPoint],
    trades: &'a [Trade],
    round_trips: &'a [RoundTrip],
    result_hash: &'a str,
}

impl<'a> From<&'a BacktestResult> for JsonReport<'a> {
    fn from(result: &'a BacktestResult) -> Self {
        JsonReport {
            result_id: &result.result_id,
            strategy_type: result.strategy_type,
            label_name: &result.label_name,
            start_date: result.start_date,
            end_date: result.end_date,
            initial_capital: result.initial_capital,
            rebalance_frequency: result.rebalance_frequency,
            top_k: result.top_k,
            final_value: result.final_value(),
            metrics: &result.metrics,
            equity_curve: &result.equity_curve,
            trades: &result.trades,
            round_trips: &result.round_trips,
            result_hash: &result.result_id,
        }
    }
}

pub fn render_report(result: &BacktestResult) -> Result<String, LabelTraderError> {
    Ok(serde_json::to_string_pretty(&JsonReport::from(result))?)
}

pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), LabelTraderError> {
        let json = render_report(result)?;
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}
