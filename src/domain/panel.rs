//! Per-symbol price series and the unified multi-symbol panel.

use crate::domain::price::PriceBar;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl SymbolSeries {
    /// Builds a series sorted by date. A repeated date keeps the last bar seen.
    pub fn new(symbol: String, bars: Vec<PriceBar>) -> Self {
        let by_date: BTreeMap<NaiveDate, PriceBar> =
            bars.into_iter().map(|bar| (bar.date, bar)).collect();
        let bars: Vec<PriceBar> = by_date.into_values().collect();
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol,
            bars,
            date_index,
        }
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// All symbols' series plus the sorted set of distinct trading dates.
#[derive(Debug, Clone, Default)]
pub struct PricePanel {
    series: BTreeMap<String, SymbolSeries>,
    timeline: Vec<NaiveDate>,
}

impl PricePanel {
    pub fn from_bars(bars: Vec<PriceBar>) -> Self {
        let mut grouped: BTreeMap<String, Vec<PriceBar>> = BTreeMap::new();
        for bar in bars {
            grouped.entry(bar.symbol.clone()).or_default().push(bar);
        }

        let series: BTreeMap<String, SymbolSeries> = grouped
            .into_iter()
            .map(|(symbol, bars)| (symbol.clone(), SymbolSeries::new(symbol, bars)))
            .collect();
        let timeline = build_unified_timeline(series.values());

        Self { series, timeline }
    }

    pub fn timeline(&self) -> &[NaiveDate] {
        &self.timeline
    }

    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    /// Series in ascending symbol order.
    pub fn iter_series(&self) -> impl Iterator<Item = &SymbolSeries> {
        self.series.values()
    }

    /// Closing prices of every symbol quoted on `date`.
    pub fn closes_on(&self, date: NaiveDate) -> HashMap<&str, f64> {
        self.series
            .values()
            .filter_map(|s| s.get_bar(date).map(|b| (s.symbol.as_str(), b.close)))
            .collect()
    }
}

pub fn build_unified_timeline<'a>(
    series: impl IntoIterator<Item = &'a SymbolSeries>,
) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(symbol: &str, date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            symbol: symbol.to_string(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
            adjusted_close: close,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn series_new_sorts_and_indexes() {
        let series = SymbolSeries::new(
            "MSFT".into(),
            vec![
                make_bar("MSFT", "2024-01-03", 102.0),
                make_bar("MSFT", "2024-01-01", 100.0),
                make_bar("MSFT", "2024-01-02", 101.0),
            ],
        );

        assert_eq!(series.bars.len(), 3);
        assert_eq!(series.get_bar_index(date(2024, 1, 1)), Some(0));
        assert_eq!(series.get_bar_index(date(2024, 1, 3)), Some(2));
        assert_eq!(series.closes(), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn series_duplicate_date_keeps_last() {
        let series = SymbolSeries::new(
            "MSFT".into(),
            vec![
                make_bar("MSFT", "2024-01-01", 100.0),
                make_bar("MSFT", "2024-01-01", 105.0),
            ],
        );
        assert_eq!(series.bars.len(), 1);
        assert!((series.get_bar(date(2024, 1, 1)).unwrap().close - 105.0).abs() < f64::EPSILON);
    }

    #[test]
    fn panel_merges_timeline_across_symbols() {
        let panel = PricePanel::from_bars(vec![
            make_bar("MSFT", "2024-01-02", 100.0),
            make_bar("MSFT", "2024-01-05", 101.0),
            make_bar("AAPL", "2024-01-01", 50.0),
            make_bar("AAPL", "2024-01-03", 51.0),
        ]);

        assert_eq!(
            panel.timeline(),
            &[
                date(2024, 1, 1),
                date(2024, 1, 2),
                date(2024, 1, 3),
                date(2024, 1, 5)
            ]
        );
        let symbols: Vec<&str> = panel.iter_series().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn closes_on_only_quoted_symbols() {
        let panel = PricePanel::from_bars(vec![
            make_bar("MSFT", "2024-01-02", 100.0),
            make_bar("AAPL", "2024-01-03", 51.0),
        ]);

        let closes = panel.closes_on(date(2024, 1, 2));
        assert_eq!(closes.get("MSFT"), Some(&100.0));
        assert!(!closes.contains_key("AAPL"));
        assert!(panel.closes_on(date(2024, 1, 4)).is_empty());

        let closes = panel.closes_on(date(2024, 1, 3));
        assert_eq!(closes.len(), 1);
        assert_eq!(closes.get("AAPL"), Some(&51.0));
    }

    #[test]
    fn empty_panel() {
        let panel = PricePanel::from_bars(vec![]);
        assert!(panel.timeline().is_empty());
        assert_eq!(panel.symbol_count(), 0);
    }
}
