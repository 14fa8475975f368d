//! Label definitions: the six ranking rules and the materialized membership rows.
//!
//! A label is a named, dated snapshot of a ranked stock universe. Its name is
//! derived from the rule and the date window, so recomputing the same rule
//! over the same window replaces the earlier snapshot.

use crate::domain::error::LabelTraderError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TOP_K: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingRule {
    Gainers,
    Losers,
    MarketCapGainers,
    MarketCapLosers,
    HighestVolume,
    HighestTurnover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl RankingRule {
    pub const ALL: [RankingRule; 6] = [
        RankingRule::Gainers,
        RankingRule::Losers,
        RankingRule::MarketCapGainers,
        RankingRule::MarketCapLosers,
        RankingRule::HighestVolume,
        RankingRule::HighestTurnover,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RankingRule::Gainers => "gainers",
            RankingRule::Losers => "losers",
            RankingRule::MarketCapGainers => "market-cap-gainers",
            RankingRule::MarketCapLosers => "market-cap-losers",
            RankingRule::HighestVolume => "highest-volume",
            RankingRule::HighestTurnover => "highest-turnover",
        }
    }

    /// Rule names used by the legacy label service.
    fn legacy_name(&self) -> &'static str {
        match self {
            RankingRule::Gainers => "涨幅最大TOP20",
            RankingRule::Losers => "跌幅最大TOP20",
            RankingRule::MarketCapGainers => "市值涨幅最大TOP20",
            RankingRule::MarketCapLosers => "市值跌幅最大TOP20",
            RankingRule::HighestVolume => "成交量最大TOP20",
            RankingRule::HighestTurnover => "换手率最高TOP20",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RankingRule::Gainers => "largest percentage price gain over the window",
            RankingRule::Losers => "largest percentage price loss over the window",
            RankingRule::MarketCapGainers => {
                "alias of gainers: no market-cap data is available, the price change is used"
            }
            RankingRule::MarketCapLosers => {
                "alias of losers: no market-cap data is available, the price change is used"
            }
            RankingRule::HighestVolume => "highest mean daily volume over the window",
            RankingRule::HighestTurnover => {
                "highest turnover proxy, mean volume divided by mean close"
            }
        }
    }

    /// True for the market-cap rules, which score exactly like gainers/losers.
    pub fn is_market_cap_proxy(&self) -> bool {
        matches!(
            self,
            RankingRule::MarketCapGainers | RankingRule::MarketCapLosers
        )
    }

    pub fn direction(&self) -> SortDirection {
        match self {
            RankingRule::Losers | RankingRule::MarketCapLosers => SortDirection::Ascending,
            _ => SortDirection::Descending,
        }
    }
}

impl fmt::Display for RankingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for RankingRule {
    type Err = LabelTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let normalized = trimmed.to_lowercase().replace('_', "-");
        RankingRule::ALL
            .into_iter()
            .find(|rule| rule.name() == normalized || rule.legacy_name() == trimmed)
            .ok_or_else(|| LabelTraderError::invalid(format!("unsupported ranking rule: {s}")))
    }
}

/// Deterministic label name: `{rule}_{start_date}_{end_date}`.
pub fn label_name(rule: RankingRule, start_date: NaiveDate, end_date: NaiveDate) -> String {
    format!("{}_{}_{}", rule.name(), start_date, end_date)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelParams {
    pub top_k: usize,
    /// Minimum `last_close * mean(volume)`; 0 disables the filter.
    pub min_market_cap: f64,
}

impl Default for LabelParams {
    fn default() -> Self {
        LabelParams {
            top_k: DEFAULT_TOP_K,
            min_market_cap: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub name: String,
    pub rule: RankingRule,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMember {
    pub label_name: String,
    pub symbol: String,
    pub rank: u32,
    pub score: f64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub definition: LabelDefinition,
    pub member_count: usize,
}
