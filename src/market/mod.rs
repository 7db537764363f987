//! Read-only market and ledger snapshot contracts.
//!
//! The validation engine only ever reads through these traits; cache refresh
//! and TTL mechanics belong to the implementations. A provider that cannot
//! answer returns an error, which callers surface as a failed validation
//! attempt rather than a silent pass.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::{
    AssetPosition, BrokerOrder, Instrument, MarketState, Quote, Wallet, WalletOrder,
};

pub mod clock;
pub mod quotes;
pub mod snapshots;

pub trait AccountBalanceProvider: Send + Sync {
    /// Account cash not already allocated to open orders.
    fn uncommitted_cash(&self) -> Result<f64>;
}

pub trait QuoteProvider: Send + Sync {
    fn quote(&self, symbol: &str) -> Result<Quote>;
}

pub trait InstrumentProvider: Send + Sync {
    fn valid_symbols(&self) -> Result<HashSet<String>>;
    fn instrument(&self, symbol: &str) -> Result<Instrument>;
}

pub trait PositionProvider: Send + Sync {
    /// Whole-account position aggregates by symbol. Symbols without a
    /// position are absent.
    fn positions(&self) -> Result<HashMap<String, AssetPosition>>;

    /// Players with a recorded claim on an open position in this symbol.
    fn liable_players(&self, symbol: &str) -> Result<HashSet<String>>;
}

pub trait BrokerOrderProvider: Send + Sync {
    /// Broker orders still in a pending state, created on or after `since`.
    fn pending_orders_since(&self, since: NaiveDate) -> Result<Vec<BrokerOrder>>;

    fn orders_by_id(&self, order_ids: &HashSet<String>) -> Result<Vec<BrokerOrder>>;
}

pub trait WalletOrderProvider: Send + Sync {
    /// Filled buy orders not yet matched by a sell, across all players.
    fn unmatched_filled_buy_orders_for_symbol(&self, symbol: &str) -> Result<Vec<WalletOrder>>;

    /// Filled-but-unmatched buy orders for one player and symbol.
    fn unmatched_filled_buy_orders(&self, player_id: &str, symbol: &str)
        -> Result<Vec<WalletOrder>>;

    /// Buy orders of one player that are unsold or still pending; these hold
    /// funds against the player's spending balance.
    fn unsold_or_pending_buy_orders(&self, player_id: &str) -> Result<Vec<WalletOrder>>;
}

pub trait WalletStore: Send + Sync {
    /// Wallet for one player. Unknown players get an empty wallet.
    fn wallet(&self, player_id: &str) -> Result<Wallet>;

    /// Wallets on record for the given players; players without one are
    /// simply absent from the result.
    fn wallets(&self, player_ids: &HashSet<String>) -> Result<Vec<Wallet>>;
}

pub trait MarketStateProvider: Send + Sync {
    fn market_state(&self, date: NaiveDate) -> Result<MarketState>;
}
