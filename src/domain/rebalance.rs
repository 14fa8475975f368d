//! Rebalance frequency and rebalance-date selection.

use crate::domain::error::LabelTraderError;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    Daily,
    /// Mondays only. A week without a Monday row has no rebalance.
    Weekly,
    /// First trading date of each (year, month).
    #[default]
    Monthly,
}

impl RebalanceFrequency {
    pub fn name(&self) -> &'static str {
        match self {
            RebalanceFrequency::Daily => "daily",
            RebalanceFrequency::Weekly => "weekly",
            RebalanceFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RebalanceFrequency {
    type Err = LabelTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RebalanceFrequency::Daily),
            "weekly" => Ok(RebalanceFrequency::Weekly),
            "monthly" => Ok(RebalanceFrequency::Monthly),
            other => Err(LabelTraderError::invalid(format!(
                "unsupported rebalance frequency: {other}"
            ))),
        }
    }
}

/// Picks rebalance dates out of an ascending, de-duplicated timeline.
pub fn rebalance_dates(timeline: &[NaiveDate], freq: RebalanceFrequency) -> Vec<NaiveDate> {
    match freq {
        RebalanceFrequency::Daily => timeline.to_vec(),
        RebalanceFrequency::Weekly => timeline
            .iter()
            .copied()
            .filter(|d| d.weekday() == Weekday::Mon)
            .collect(),
        RebalanceFrequency::Monthly => period_starts(timeline, |d| (d.year(), d.month())),
    }
}

fn period_starts<T: PartialEq>(
    timeline: &[NaiveDate],
    period_fn: impl Fn(&NaiveDate) -> T,
) -> Vec<NaiveDate> {
    let mut starts = Vec::new();
    let mut current: Option<T> = None;
    for date in timeline {
        let period = period_fn(date);
        if current.as_ref() != Some(&period) {
            starts.push(*date);
            current = Some(period);
        }
    }
    starts
}
