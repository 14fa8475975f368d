//! Executed fills and FIFO round-trip pairing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub shares: u64,
    pub price: f64,
    pub value: f64,
}

impl Trade {
    pub fn new(date: NaiveDate, symbol: &str, action: TradeAction, shares: u64, price: f64) -> Self {
        Trade {
            date,
            symbol: symbol.to_string(),
            action,
            shares,
            price,
            value: shares as f64 * price,
        }
    }
}

/// A sell matched against an earlier buy lot of the same symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub symbol: String,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub buy_price: f64,
    pub sell_price: f64,
    pub shares: u64,
    pub pnl: f64,
    /// `sell_price / buy_price - 1`, as a fraction.
    pub return_pct: f64,
}

impl RoundTrip {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

struct Lot {
    date: NaiveDate,
    price: f64,
    remaining: u64,
}

/// Pairs every sell with the oldest open buy lots of its symbol. A sell that
/// spans several lots yields one round trip per lot; unmatched sell shares
/// are ignored.
pub fn pair_round_trips(trades: &[Trade]) -> Vec<RoundTrip> {
    let mut open: BTreeMap<&str, VecDeque<Lot>> = BTreeMap::new();
    let mut trips = Vec::new();

    for trade in trades {
        match trade.action {
            TradeAction::Buy => {
                if trade.shares > 0 {
                    open.entry(trade.symbol.as_str()).or_default().push_back(Lot {
                        date: trade.date,
                        price: trade.price,
                        remaining: trade.shares,
                    });
                }
            }
            TradeAction::Sell => {
                let Some(lots) = open.get_mut(trade.symbol.as_str()) else {
                    continue;
                };
                let mut to_match = trade.shares;
                while to_match > 0 {
                    let Some(lot) = lots.front_mut() else {
                        break;
                    };
                    let matched = to_match.min(lot.remaining);
                    let pnl = (trade.price - lot.price) * matched as f64;
                    let return_pct = if lot.price > 0.0 {
                        trade.price / lot.price - 1.0
                    } else {
                        0.0
                    };
                    trips.push(RoundTrip {
                        symbol: trade.symbol.clone(),
                        buy_date: lot.date,
                        sell_date: trade.date,
                        buy_price: lot.price,
                        sell_price: trade.price,
                        shares: matched,
                        pnl,
                        return_pct,
                    });
                    lot.remaining -= matched;
                    to_match -= matched;
                    if lot.remaining == 0 {
                        lots.pop_front();
                    }
                }
            }
        }
    }

    trips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn trade_value_is_shares_times_price() {
        let t = Trade::new(d(2), "AAA", TradeAction::Buy, 150, 10.5);
        assert!((t.value - 1575.0).abs() < f64::EPSILON);
    }

    #[test]
    fn simple_round_trip() {
        let trades = vec![
            Trade::new(d(2), "AAA", TradeAction::Buy, 100, 10.0),
            Trade::new(d(9), "AAA", TradeAction::Sell, 100, 12.0),
        ];
        let trips = pair_round_trips(&trades);
        assert_eq!(trips.len(), 1);
        assert!((trips[0].pnl - 200.0).abs() < 1e-9);
        assert!((trips[0].return_pct - 0.2).abs() < 1e-12);
        assert!(trips[0].is_win());
        assert_eq!(trips[0].buy_date, d(2));
        assert_eq!(trips[0].sell_date, d(9));
    }

    #[test]
    fn sell_consumes_oldest_lots_first() {
        let trades = vec![
            Trade::new(d(2), "AAA", TradeAction::Buy, 50, 10.0),
            Trade::new(d(3), "AAA", TradeAction::Buy, 50, 14.0),
            Trade::new(d(4), "AAA", TradeAction::Sell, 80, 12.0),
        ];
        let trips = pair_round_trips(&trades);
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].shares, 50);
        assert!((trips[0].buy_price - 10.0).abs() < f64::EPSILON);
        assert!(trips[0].is_win());
        assert_eq!(trips[1].shares, 30);
        assert!((trips[1].buy_price - 14.0).abs() < f64::EPSILON);
        assert!(!trips[1].is_win());
    }

    #[test]
    fn symbols_are_paired_independently() {
        let trades = vec![
            Trade::new(d(2), "AAA", TradeAction::Buy, 10, 10.0),
            Trade::new(d(2), "BBB", TradeAction::Buy, 10, 20.0),
            Trade::new(d(3), "BBB", TradeAction::Sell, 10, 18.0),
        ];
        let trips = pair_round_trips(&trades);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].symbol, "BBB");
        assert!((trips[0].pnl + 20.0).abs() < 1e-9);
    }

    #[test]
    fn unmatched_sell_is_ignored() {
        let trades = vec![Trade::new(d(3), "AAA", TradeAction::Sell, 10, 18.0)];
        assert!(pair_round_trips(&trades).is_empty());
    }

    #[test]
    fn open_position_has_no_round_trip() {
        let trades = vec![Trade::new(d(2), "AAA", TradeAction::Buy, 10, 10.0)];
        assert!(pair_round_trips(&trades).is_empty());
    }
}
