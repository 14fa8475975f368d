#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use labeltrader::domain::error::LabelTraderError;
use labeltrader::domain::label::{
    LabelDefinition, LabelMember, LabelSummary, RankingRule, label_name,
};
pub use labeltrader::domain::price::PriceBar;
pub use labeltrader::domain::task::TaskStatus;
use labeltrader::ports::label_port::LabelPort;
use labeltrader::ports::price_port::PricePort;
use labeltrader::ports::progress_port::ProgressPort;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// In-memory price store.
pub struct MockPricePort {
    pub bars: Vec<PriceBar>,
    pub fail_on: Option<String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            fail_on: None,
        }
    }

    pub fn with_bars(mut self, bars: Vec<PriceBar>) -> Self {
        self.bars.extend(bars);
        self
    }

    /// Every fetch touching `symbol` fails with a database error.
    pub fn with_failure(mut self, symbol: &str) -> Self {
        self.fail_on = Some(symbol.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), LabelTraderError> {
        match &self.fail_on {
            Some(s) if s == symbol => Err(LabelTraderError::Database {
                reason: format!("connection lost while reading {symbol}"),
            }),
            _ => Ok(()),
        }
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(
        &self,
        symbols: &BTreeSet<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        for symbol in symbols {
            self.check(symbol)?;
        }
        let mut bars: Vec<PriceBar> = self
            .bars
            .iter()
            .filter(|b| symbols.contains(&b.symbol) && b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect();
        bars.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(bars)
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        self.check(symbol)?;
        let mut bars: Vec<PriceBar> = self
            .bars
            .iter()
            .filter(|b| b.symbol == symbol && b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect();
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, LabelTraderError> {
        let symbols: BTreeSet<String> = self.bars.iter().map(|b| b.symbol.clone()).collect();
        Ok(symbols.into_iter().collect())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LabelTraderError> {
        self.check(symbol)?;
        let dates: Vec<NaiveDate> = self
            .bars
            .iter()
            .filter(|b| b.symbol == symbol)
            .map(|b| b.date)
            .collect();
        Ok(match (dates.iter().min(), dates.iter().max()) {
            (Some(&min), Some(&max)) => Some((min, max, dates.len())),
            _ => None,
        })
    }
}

/// In-memory label store.
#[derive(Default)]
pub struct MockLabelPort {
    pub labels: Mutex<BTreeMap<String, (LabelDefinition, Vec<LabelMember>)>>,
    pub replace_calls: Mutex<usize>,
}

impl MockLabelPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a label directly, ranked in the given order.
    pub fn with_label(self, name: &str, symbols: &[&str]) -> Self {
        let definition = LabelDefinition {
            name: name.to_string(),
            rule: RankingRule::Gainers,
            start_date: date(2023, 1, 1),
            end_date: date(2023, 12, 31),
            created_at: created_at(),
        };
        let members = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| LabelMember {
                label_name: name.to_string(),
                symbol: s.to_string(),
                rank: (i + 1) as u32,
                score: 0.0,
                metadata: serde_json::Value::Null,
            })
            .collect();
        self.labels
            .lock()
            .unwrap()
            .insert(name.to_string(), (definition, members));
        self
    }

    pub fn label_count(&self) -> usize {
        self.labels.lock().unwrap().len()
    }

    pub fn replace_count(&self) -> usize {
        *self.replace_calls.lock().unwrap()
    }
}

impl LabelPort for MockLabelPort {
    fn replace_label(
        &self,
        definition: &LabelDefinition,
        members: &[LabelMember],
    ) -> Result<(), LabelTraderError> {
        *self.replace_calls.lock().unwrap() += 1;
        self.labels.lock().unwrap().insert(
            definition.name.clone(),
            (definition.clone(), members.to_vec()),
        );
        Ok(())
    }

    fn get_label(&self, name: &str) -> Result<Option<LabelDefinition>, LabelTraderError> {
        Ok(self.labels.lock().unwrap().get(name).map(|(d, _)| d.clone()))
    }

    fn get_label_members(&self, name: &str) -> Result<Vec<LabelMember>, LabelTraderError> {
        Ok(self
            .labels
            .lock()
            .unwrap()
            .get(name)
            .map(|(_, m)| m.clone())
            .unwrap_or_default())
    }

    fn list_labels(&self) -> Result<Vec<LabelSummary>, LabelTraderError> {
        Ok(self
            .labels
            .lock()
            .unwrap()
            .values()
            .map(|(d, m)| LabelSummary {
                definition: d.clone(),
                member_count: m.len(),
            })
            .collect())
    }

    fn delete_label(&self, name: &str) -> Result<bool, LabelTraderError> {
        Ok(self.labels.lock().unwrap().remove(name).is_some())
    }
}

/// Records every progress update and status change in arrival order.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(String, u8, String)>>,
    pub statuses: Mutex<Vec<(String, TaskStatus)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events.lock().unwrap().iter().map(|(_, p, _)| *p).collect()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.statuses.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }
}

impl ProgressPort for RecordingProgress {
    fn on_progress(&self, task_id: &str, percent: u8, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((task_id.to_string(), percent, message.to_string()));
    }

    fn on_status(&self, task_id: &str, status: &TaskStatus) {
        self.statuses
            .lock()
            .unwrap()
            .push((task_id.to_string(), status.clone()));
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn created_at() -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(9, 30, 0).unwrap()
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64, volume: i64) -> PriceBar {
    PriceBar {
        date,
        symbol: symbol.to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        adjusted_close: close,
    }
}

/// One bar per calendar day from `start`, with the given closes.
pub fn series(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, start + chrono::Duration::days(i as i64), close, 1_000))
        .collect()
}

/// `count` daily bars from `start`, price moving by `step` each day.
pub fn linear_series(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    start_price: f64,
    step: f64,
) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + step * i as f64).collect();
    series(symbol, start, &closes)
}

pub fn gainers_name(start: NaiveDate, end: NaiveDate) -> String {
    label_name(RankingRule::Gainers, start, end)
}
