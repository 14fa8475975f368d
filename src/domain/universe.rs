//! Stock universes: the symbol set a backtest trades, taken from a label,
//! and comma-separated symbol lists given on the command line.

use crate::domain::error::LabelTraderError;
use crate::ports::label_port::LabelPort;
use std::collections::{BTreeSet, HashSet};

/// Symbols of the named label. An unknown or empty label is an error.
pub fn load_label_universe(
    labels: &dyn LabelPort,
    label_name: &str,
) -> Result<BTreeSet<String>, LabelTraderError> {
    let members = labels.get_label_members(label_name)?;
    if members.is_empty() {
        return Err(LabelTraderError::insufficient(format!(
            "label {label_name} has no members"
        )));
    }
    Ok(members.into_iter().map(|m| m.symbol).collect())
}

/// Parses `"AAA, bbb"` into upper-cased symbols, rejecting empty tokens and duplicates.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, LabelTraderError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(LabelTraderError::invalid("empty token in symbol list"));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(LabelTraderError::invalid(format!("duplicate symbol: {symbol}")));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}
