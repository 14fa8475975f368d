//! Day-by-day portfolio simulation over the price panel.
//!
//! On a date with signals every quoted holding is liquidated first, then the
//! signals are bought in emitted order. Every date ends with a mark-to-market
//! row. A holding without a quote on a rebalance date is carried to the next
//! rebalance date where it has one.

use crate::domain::error::LabelTraderError;
use crate::domain::panel::PricePanel;
use crate::domain::portfolio::{Portfolio, PortfolioState};
use crate::domain::signal::Signal;
use crate::domain::trade::{Trade, TradeAction};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub fn simulate(
    panel: &PricePanel,
    signals: &[Signal],
    initial_capital: f64,
) -> Result<(Vec<PortfolioState>, Vec<Trade>), LabelTraderError> {
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(LabelTraderError::invalid(format!(
            "initial_capital must be a positive number, got {initial_capital}"
        )));
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&Signal>> = BTreeMap::new();
    for signal in signals.iter().filter(|s| s.action == TradeAction::Buy) {
        by_date.entry(signal.date).or_default().push(signal);
    }

    let mut portfolio = Portfolio::new(initial_capital);

    for &date in panel.timeline() {
        let closes = panel.closes_on(date);

        if let Some(day_signals) = by_date.get(&date) {
            for symbol in portfolio.liquidate(date, &closes) {
                warn!(%date, %symbol, "no quote on rebalance date, holding carried forward");
            }
            for signal in day_signals {
                if portfolio
                    .buy(date, &signal.symbol, signal.reference_price, signal.weight)
                    .is_none()
                {
                    debug!(%date, symbol = %signal.symbol, price = signal.reference_price, "allocation too small, buy skipped");
                }
            }
        }

        portfolio.mark_to_market(date, &closes);
    }

    Ok((portfolio.states, portfolio.trades))
}
