//! Chat token parsing.
//!
//! A token maps to zero or one candidate; anything richer belongs to the
//! chat layer. Tickers accept an optional `$` sigil and are uppercased.

use crate::models::{TradeAction, TradeCommand};

/// Parse a chat vote of the form `!buy AMZN`, `!sell $tsla` or `!skip`.
pub fn parse_trade_vote(message: &str) -> Option<TradeCommand> {
    let mut tokens = message.split_whitespace();
    let command = tokens.next()?;

    let action = match command.trim_start_matches('!').to_ascii_lowercase().as_str() {
        "buy" => TradeAction::Buy,
        "sell" => TradeAction::Sell,
        "skip" => return Some(TradeCommand::new(TradeAction::Skip, "")),
        _ => return None,
    };

    let symbol = normalize_symbol(tokens.next()?);
    if symbol.is_empty() {
        return None;
    }

    Some(TradeCommand::new(action, symbol))
}

fn normalize_symbol(token: &str) -> String {
    token.trim_start_matches('$').to_ascii_uppercase()
}
