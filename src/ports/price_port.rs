//! Price series access port.

use crate::domain::error::LabelTraderError;
use crate::domain::price::PriceBar;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Source of daily price bars. Missing data yields empty results, never errors.
pub trait PricePort: Send + Sync {
    /// Bars for every requested symbol in `[start_date, end_date]`, ordered by (date, symbol).
    fn fetch_prices(
        &self,
        symbols: &BTreeSet<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError>;

    /// Bars for one symbol in `[start_date, end_date]`, ordered by date.
    fn fetch_symbol(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError>;

    /// All known symbols, sorted ascending.
    fn list_symbols(&self) -> Result<Vec<String>, LabelTraderError>;

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LabelTraderError>;
}
