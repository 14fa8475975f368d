//! Ranking engine: scores every candidate symbol under a [`RankingRule`] and
//! materializes the top-K as a named label.
//!
//! Scoring is independent per symbol and runs on the rayon pool. Scores are
//! collected first and sorted once, so the tie-break (symbol ascending) does
//! not depend on which worker finished first.

use crate::domain::error::LabelTraderError;
use crate::domain::label::{
    LabelDefinition, LabelMember, LabelParams, RankingRule, SortDirection, label_name,
};
use crate::domain::price::{PriceBar, mean_close, mean_volume};
use crate::domain::task::{CancellationToken, ProgressReporter, TaskStatus};
use crate::ports::label_port::LabelPort;
use crate::ports::price_port::PricePort;
use crate::ports::progress_port::ProgressPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde_json::json;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

const PROGRESS_SCORING_START: u8 = 40;
const PROGRESS_SCORING_END: u8 = 90;

#[derive(Debug, Clone)]
pub struct LabelRequest {
    pub rule: RankingRule,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub params: LabelParams,
    pub task_id: String,
}

impl LabelRequest {
    pub fn label_name(&self) -> String {
        label_name(self.rule, self.start_date, self.end_date)
    }

    fn validate(&self) -> Result<(), LabelTraderError> {
        if self.params.top_k == 0 {
            return Err(LabelTraderError::invalid("top_k must be at least 1"));
        }
        if !self.params.min_market_cap.is_finite() || self.params.min_market_cap < 0.0 {
            return Err(LabelTraderError::invalid(
                "min_market_cap must be a non-negative number",
            ));
        }
        if self.start_date > self.end_date {
            return Err(LabelTraderError::invalid(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolScore {
    pub symbol: String,
    pub score: f64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedLabel {
    pub definition: LabelDefinition,
    pub members: Vec<LabelMember>,
    pub candidates: usize,
}

fn passes_market_cap(last_close: f64, avg_volume: f64, min_market_cap: f64) -> bool {
    min_market_cap <= 0.0 || last_close * avg_volume >= min_market_cap
}

/// Scores one symbol's bars for the window. `None` means the symbol does not qualify.
pub fn score_symbol(
    rule: RankingRule,
    symbol: &str,
    bars: &[PriceBar],
    params: &LabelParams,
) -> Option<SymbolScore> {
    let first = bars.first()?;
    let last = bars.last()?;
    let avg_volume = mean_volume(bars)?;

    let scored = match rule {
        RankingRule::Gainers
        | RankingRule::Losers
        | RankingRule::MarketCapGainers
        | RankingRule::MarketCapLosers => {
            if bars.len() < 2 || first.close <= 0.0 {
                return None;
            }
            if !passes_market_cap(last.close, avg_volume, params.min_market_cap) {
                return None;
            }
            let change_pct = (last.close - first.close) / first.close * 100.0;
            SymbolScore {
                symbol: symbol.to_string(),
                score: change_pct,
                metadata: json!({
                    "change_pct": change_pct,
                    "start_price": first.close,
                    "end_price": last.close,
                    "avg_volume": avg_volume,
                }),
            }
        }
        RankingRule::HighestVolume => {
            if avg_volume <= 0.0 || last.close <= 0.0 {
                return None;
            }
            if !passes_market_cap(last.close, avg_volume, params.min_market_cap) {
                return None;
            }
            let total_volume: f64 = bars.iter().map(|b| b.volume as f64).sum();
            SymbolScore {
                symbol: symbol.to_string(),
                score: avg_volume,
                metadata: json!({
                    "avg_volume": avg_volume,
                    "total_volume": total_volume,
                    "last_price": last.close,
                }),
            }
        }
        RankingRule::HighestTurnover => {
            let avg_price = mean_close(bars)?;
            if avg_volume <= 0.0 || avg_price <= 0.0 {
                return None;
            }
            let turnover_rate = avg_volume / avg_price;
            SymbolScore {
                symbol: symbol.to_string(),
                score: turnover_rate,
                metadata: json!({
                    "turnover_rate": turnover_rate,
                    "avg_volume": avg_volume,
                    "avg_price": avg_price,
                }),
            }
        }
    };

    scored.score.is_finite().then_some(scored)
}

/// Sorts by the rule's direction, then symbol ascending, and keeps the first `top_k`.
pub fn rank_scores(rule: RankingRule, mut scores: Vec<SymbolScore>, top_k: usize) -> Vec<SymbolScore> {
    let direction = rule.direction();
    scores.sort_by(|a, b| {
        let by_score = match direction {
            SortDirection::Descending => b.score.partial_cmp(&a.score),
            SortDirection::Ascending => a.score.partial_cmp(&b.score),
        };
        by_score
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    scores.truncate(top_k);
    scores
}

/// Dense 1-based ranks in the given order.
pub fn assign_ranks(label_name: &str, ranked: Vec<SymbolScore>) -> Vec<LabelMember> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, s)| LabelMember {
            label_name: label_name.to_string(),
            symbol: s.symbol,
            rank: (i + 1) as u32,
            score: s.score,
            metadata: s.metadata,
        })
        .collect()
}

pub struct LabelCalculator<'a> {
    prices: &'a dyn PricePort,
    labels: &'a dyn LabelPort,
}

impl<'a> LabelCalculator<'a> {
    pub fn new(prices: &'a dyn PricePort, labels: &'a dyn LabelPort) -> Self {
        Self { prices, labels }
    }

    /// Scores every symbol in the price store and replaces the label named after
    /// the request. Nothing is persisted when the run fails or is cancelled.
    ///
    /// The progress port sees `Queued`, `Running`, then exactly one of
    /// `Completed` or `Failed` carrying the error text.
    pub fn compute_label(
        &self,
        request: &LabelRequest,
        progress: &dyn ProgressPort,
        cancel: &CancellationToken,
    ) -> Result<RankedLabel, LabelTraderError> {
        let reporter = ProgressReporter::new(progress, &request.task_id);
        reporter.status(&TaskStatus::Queued);
        reporter.status(&TaskStatus::Running);

        let outcome = self.run_label(request, &reporter, cancel);
        match &outcome {
            Ok(_) => reporter.status(&TaskStatus::Completed),
            Err(e) => {
                warn!(task_id = %request.task_id, error = %e, "label task failed");
                reporter.status(&TaskStatus::Failed {
                    error: e.to_string(),
                });
            }
        }
        outcome
    }

    fn run_label(
        &self,
        request: &LabelRequest,
        reporter: &ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<RankedLabel, LabelTraderError> {
        request.validate()?;
        let name = request.label_name();

        reporter.milestone(10, &format!("preparing label {name}"));
        info!(task_id = %request.task_id, label = %name, "computing label");

        reporter.milestone(30, "listing symbols");
        let symbols = self.prices.list_symbols()?;
        if symbols.is_empty() {
            return Err(LabelTraderError::insufficient(
                "no symbols available in the price store",
            ));
        }
        reporter.milestone(
            PROGRESS_SCORING_START,
            &format!("found {} symbols, scoring", symbols.len()),
        );

        let total = symbols.len();
        let scored: Vec<Option<SymbolScore>> = symbols
            .par_iter()
            .map(|symbol| {
                if cancel.is_cancelled() {
                    return Err(LabelTraderError::Cancelled {
                        task_id: request.task_id.clone(),
                    });
                }
                let bars = self
                    .prices
                    .fetch_symbol(symbol, request.start_date, request.end_date)?;
                let score = score_symbol(request.rule, symbol, &bars, &request.params);
                if score.is_none() {
                    debug!(symbol = %symbol, bars = bars.len(), "symbol does not qualify");
                }
                reporter.item_done(total, PROGRESS_SCORING_START, PROGRESS_SCORING_END);
                Ok(score)
            })
            .collect::<Result<Vec<_>, LabelTraderError>>()?;

        if cancel.is_cancelled() {
            return Err(LabelTraderError::Cancelled {
                task_id: request.task_id.clone(),
            });
        }

        let qualified: Vec<SymbolScore> = scored.into_iter().flatten().collect();
        let qualified_count = qualified.len();
        let ranked = rank_scores(request.rule, qualified, request.params.top_k);
        let members = assign_ranks(&name, ranked);

        let definition = LabelDefinition {
            name: name.clone(),
            rule: request.rule,
            start_date: request.start_date,
            end_date: request.end_date,
            created_at: chrono::Local::now().naive_local(),
        };

        reporter.milestone(PROGRESS_SCORING_END, "saving label");
        self.labels.replace_label(&definition, &members)?;
        reporter.milestone(
            100,
            &format!("label computed: {} symbols", members.len()),
        );
        info!(
            label = %name,
            candidates = total,
            qualified = qualified_count,
            members = members.len(),
            "label computed"
        );

        Ok(RankedLabel {
            definition,
            members,
            candidates: total,
        })
    }
}
