//! Market session state for "now" and business-day scans.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};

use crate::models::MarketState;

use super::MarketStateProvider;

/// Upper bound on the forward scan for the next open market day. The state
/// source has no such bound of its own; without one a source that never
/// reports an open day would spin forever.
pub const MAX_BUSINESS_DAY_SCAN: usize = 366;

/// Answers "is the market open / after hours right now" by consulting the
/// market-state snapshot for the current calendar date.
pub struct MarketClock {
    provider: Arc<dyn MarketStateProvider>,
}

impl MarketClock {
    pub fn new(provider: Arc<dyn MarketStateProvider>) -> Self {
        Self { provider }
    }

    pub fn is_market_open_now(&self) -> Result<bool> {
        Ok(self.state_today()?.is_open_now)
    }

    pub fn is_after_hours(&self) -> Result<bool> {
        Ok(self.state_today()?.is_after_hours_now)
    }

    pub fn is_market_open_today(&self) -> Result<bool> {
        Ok(self.state_today()?.is_open_this_day)
    }

    fn state_today(&self) -> Result<MarketState> {
        self.provider.market_state(Local::now().date_naive())
    }

    /// First date after `from` whose market state marks it open.
    pub fn next_business_day(&self, from: NaiveDate) -> Result<MarketState> {
        let mut date = from.succ_opt().context("date out of range")?;

        for _ in 0..MAX_BUSINESS_DAY_SCAN {
            let state = self.provider.market_state(date)?;
            if state.is_open_this_day {
                return Ok(state);
            }
            date = date.succ_opt().context("date out of range")?;
        }

        bail!(
            "no open market day within {} days of {}",
            MAX_BUSINESS_DAY_SCAN,
            from
        )
    }
}

/// The local calendar date, for "orders placed today" queries.
pub fn start_of_today() -> NaiveDate {
    Local::now().date_naive()
}
