//! Portfolio state, daily valuation rows and the equity curve.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::trade::{Trade, TradeAction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub date: NaiveDate,
    pub cash: f64,
    pub positions_value: f64,
    pub total_value: f64,
    pub cumulative_return: f64,
}

impl From<&PortfolioState> for EquityPoint {
    fn from(state: &PortfolioState) -> Self {
        EquityPoint {
            date: state.date,
            value: state.total_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Shares held per symbol. Only long positions, never zero.
    pub holdings: BTreeMap<String, u64>,
    pub trades: Vec<Trade>,
    pub states: Vec<PortfolioState>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            holdings: BTreeMap::new(),
            trades: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Sells every holding quoted in `closes`, in symbol order. Returns the
    /// symbols left in place because they had no quote.
    pub fn liquidate(&mut self, date: NaiveDate, closes: &HashMap<&str, f64>) -> Vec<String> {
        let mut carried = BTreeMap::new();
        for (symbol, shares) in std::mem::take(&mut self.holdings) {
            match closes.get(symbol.as_str()) {
                Some(&price) => {
                    let trade = Trade::new(date, &symbol, TradeAction::Sell, shares, price);
                    self.cash += trade.value;
                    self.trades.push(trade);
                }
                None => {
                    carried.insert(symbol, shares);
                }
            }
        }
        let carried_symbols = carried.keys().cloned().collect();
        self.holdings = carried;
        carried_symbols
    }

    /// Buys `floor(cash * weight / price)` shares. Returns `None` when
    /// nothing is bought.
    pub fn buy(&mut self, date: NaiveDate, symbol: &str, price: f64, weight: f64) -> Option<&Trade> {
        if price <= 0.0 || !price.is_finite() {
            return None;
        }
        let allocation = self.cash * weight;
        let shares = (allocation / price).floor();
        if !shares.is_finite() || shares < 1.0 {
            return None;
        }
        let shares = shares as u64;
        let trade = Trade::new(date, symbol, TradeAction::Buy, shares, price);
        if trade.value > self.cash {
            return None;
        }
        self.cash -= trade.value;

        *self.holdings.entry(symbol.to_string()).or_insert(0) += shares;

        self.trades.push(trade);
        self.trades.last()
    }

    /// Marks holdings to `closes` (0 for a missing quote) and records the day's row.
    pub fn mark_to_market(&mut self, date: NaiveDate, closes: &HashMap<&str, f64>) -> &PortfolioState {
        let positions_value: f64 = self
            .holdings
            .iter()
            .map(|(symbol, &shares)| {
                closes
                    .get(symbol.as_str())
                    .map_or(0.0, |&p| shares as f64 * p)
            })
            .sum();
        let total_value = self.cash + positions_value;
        let cumulative_return = if self.initial_capital > 0.0 {
            (total_value - self.initial_capital) / self.initial_capital
        } else {
            0.0
        };
        self.states.push(PortfolioState {
            date,
            cash: self.cash,
            positions_value,
            total_value,
            cumulative_return,
        });
        &self.states[self.states.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100_000.0);
        assert!((portfolio.cash - 100_000.0).abs() < f64::EPSILON);
        assert!(portfolio.holdings.is_empty());
        assert!(portfolio.trades.is_empty());
        assert!(portfolio.states.is_empty());
    }

    #[test]
    fn buy_floors_shares_and_keeps_remainder_in_cash() {
        let mut portfolio = Portfolio::new(1_000.0);
        let trade = portfolio.buy(d(2), "AAA", 30.0, 0.5).unwrap();
        // 500 / 30 = 16.67 -> 16 shares
        assert_eq!(trade.shares, 16);
        assert!((portfolio.cash - (1_000.0 - 480.0)).abs() < 1e-9);
        assert_eq!(portfolio.holdings.get("AAA"), Some(&16));
    }

    #[test]
    fn buy_uses_current_cash_sequentially() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.buy(d(2), "AAA", 10.0, 0.5);
        let second = portfolio.buy(d(2), "BBB", 10.0, 0.5).unwrap();
        assert_eq!(second.shares, 25);
        assert!((portfolio.cash - 250.0).abs() < 1e-9);
    }

    #[test]
    fn buy_skips_zero_shares_and_bad_prices() {
        let mut portfolio = Portfolio::new(100.0);
        assert!(portfolio.buy(d(2), "AAA", 500.0, 1.0).is_none());
        assert!(portfolio.buy(d(2), "AAA", 0.0, 1.0).is_none());
        assert!(portfolio.buy(d(2), "AAA", f64::NAN, 1.0).is_none());
        assert!((portfolio.cash - 100.0).abs() < f64::EPSILON);
        assert!(portfolio.trades.is_empty());
    }

    #[test]
    fn repeated_buys_accumulate_shares() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.buy(d(2), "AAA", 10.0, 0.5);
        portfolio.buy(d(3), "AAA", 10.0, 0.5);
        // 50 shares, then 250 / 10 = 25 more
        assert_eq!(portfolio.holdings.get("AAA"), Some(&75));
        assert_eq!(portfolio.holdings.len(), 1);
        assert_eq!(portfolio.trades.len(), 2);
    }

    #[test]
    fn liquidate_sells_quoted_and_carries_unquoted() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.buy(d(2), "AAA", 10.0, 0.5);
        portfolio.buy(d(2), "BBB", 10.0, 0.5);

        let closes: HashMap<&str, f64> = [("AAA", 12.0)].into_iter().collect();
        let carried = portfolio.liquidate(d(3), &closes);

        assert_eq!(carried, vec!["BBB".to_string()]);
        assert_eq!(portfolio.holdings.get("BBB"), Some(&50));
        assert!(!portfolio.holdings.contains_key("AAA"));
        let sell = portfolio.trades.last().unwrap();
        assert_eq!(sell.action, TradeAction::Sell);
        assert_eq!(sell.shares, 50);
        assert!((portfolio.cash - (250.0 + 600.0)).abs() < 1e-9);
    }

    #[test]
    fn mark_to_market_values_missing_quote_at_zero() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.buy(d(2), "AAA", 10.0, 1.0);
        let empty = HashMap::new();
        let state = portfolio.mark_to_market(d(3), &empty).clone();
        assert!((state.positions_value - 0.0).abs() < f64::EPSILON);
        assert!((state.total_value - state.cash).abs() < f64::EPSILON);

        let closes: HashMap<&str, f64> = [("AAA", 11.0)].into_iter().collect();
        let state = portfolio.mark_to_market(d(4), &closes).clone();
        assert!((state.total_value - 1_100.0).abs() < 1e-9);
        assert!((state.cumulative_return - 0.1).abs() < 1e-12);
        assert_eq!(portfolio.states.len(), 2);
    }
}
