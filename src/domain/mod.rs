//! Core domain types and logic.

pub mod price;
pub mod panel;
pub mod label;
pub mod ranking;
pub mod rebalance;
pub mod signal;
pub mod trade;
pub mod portfolio;
pub mod simulator;
pub mod metrics;
pub mod backtest;
pub mod universe;
pub mod config_validation;
pub mod task;
pub mod error;
