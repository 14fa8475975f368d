//! CSV directory price adapter: one `<SYMBOL>.csv` file per symbol with
//! columns `date,open,high,low,close,volume[,adj_close]`.

use crate::domain::error::LabelTraderError;
use crate::domain::price::PriceBar;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default, alias = "adjusted_close")]
    adj_close: Option<f64>,
}

fn read_error(path: &Path, reason: impl std::fmt::Display) -> LabelTraderError {
    LabelTraderError::Database {
        reason: format!("{}: {}", path.display(), reason),
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Reads one symbol file. A missing file reads as no data.
    fn read_symbol(&self, symbol: &str) -> Result<Vec<PriceBar>, LabelTraderError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| read_error(&path, e))?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| read_error(&path, e))?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                read_error(&path, format!("row {}: invalid date {:?}: {e}", line + 1, row.date))
            })?;
            bars.push(PriceBar {
                date,
                symbol: symbol.to_string(),
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.round() as i64,
                adjusted_close: row.adj_close.unwrap_or(row.close),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// Every bar of every symbol in the directory.
    pub fn load_all(&self) -> Result<Vec<PriceBar>, LabelTraderError> {
        let mut bars = Vec::new();
        for symbol in self.list_symbols()? {
            bars.extend(self.read_symbol(&symbol)?);
        }
        Ok(bars)
    }
}

impl PricePort for CsvAdapter {
    fn fetch_prices(
        &self,
        symbols: &BTreeSet<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        let mut bars = Vec::new();
        for symbol in symbols {
            bars.extend(self.fetch_symbol(symbol, start_date, end_date)?);
        }
        bars.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(bars)
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        let mut bars = self.read_symbol(symbol)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, LabelTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| read_error(&self.base_path, e))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| read_error(&self.base_path, e))?.path();
            // Must match the `{symbol}.csv` name the fetches open.
            let is_csv = path.extension().is_some_and(|ext| ext == "csv");
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LabelTraderError> {
        let bars = self.read_symbol(symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
