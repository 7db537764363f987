//! Price resolution over quote snapshots.

use crate::models::{AssetPosition, Quote};

/// Extended-hours prices below this are treated as "no after-hours trade".
const PRICE_EPSILON: f64 = 0.001;

/// The price a command should be judged against right now: the after-hours
/// trade when one exists, otherwise the last regular-session trade.
pub fn most_recent_price(quote: &Quote) -> f64 {
    let after_hours = quote.last_extended_hours_trade_price;

    if after_hours.abs() > PRICE_EPSILON {
        after_hours
    } else {
        quote.last_trade_price
    }
}

/// Percent change of the most recent price against the previous close.
pub fn percent_change(quote: &Quote) -> f64 {
    let change = most_recent_price(quote) - quote.previous_close;
    (change / quote.previous_close) * 100.0
}

/// Percent return of a position against its average buy price. A position
/// with no cost basis reads as fully profitable.
pub fn percent_return(position: &AssetPosition, quote: &Quote) -> f64 {
    if position.avg_buy_price <= 0.0 {
        return 100.0;
    }
    let price = most_recent_price(quote);
    (price - position.avg_buy_price) / position.avg_buy_price * 100.0
}

/// Current market value of a position.
pub fn position_value(position: &AssetPosition, quote: &Quote) -> f64 {
    position.shares as f64 * most_recent_price(quote)
}
