//! Core data types shared by the election and validation engines.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::election::Candidate;

lazy_static! {
    /// Broker order states that still hold funds against a player's balance.
    pub static ref PENDING_ORDER_STATES: HashSet<&'static str> =
        ["confirmed", "unconfirmed", "queued"].iter().copied().collect();
}

/// A platform identity casting votes.
///
/// Equality and hashing only consider platform and username. Channel and
/// subscriber status are attributes, not identity: the same person voting
/// from two channels must count once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    pub username: String,
    pub platform: String,
    pub channel: String,
    pub subscriber: bool,
}

impl Voter {
    pub fn new(
        username: impl Into<String>,
        platform: impl Into<String>,
        channel: impl Into<String>,
        subscriber: bool,
    ) -> Self {
        Self {
            username: username.into(),
            platform: platform.into(),
            channel: channel.into(),
            subscriber,
        }
    }

    pub fn player_id(&self) -> String {
        format!("{}:{}", self.platform, self.username)
    }
}

impl PartialEq for Voter {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && self.platform == other.platform
    }
}

impl Eq for Voter {}

impl Hash for Voter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
        self.platform.hash(state);
    }
}

/// Actions the crowd can vote on for the shared account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Skip,
}

impl TradeAction {
    pub fn as_str(&self) -> &str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Skip => "SKIP",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed trade for the shared account: one votable candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeCommand {
    pub action: TradeAction,
    pub symbol: String,
}

impl TradeCommand {
    pub fn new(action: TradeAction, symbol: impl Into<String>) -> Self {
        Self {
            action,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for TradeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format!("{} {}", self.action, self.symbol).trim())
    }
}

impl Candidate for TradeCommand {
    fn label(&self) -> String {
        self.to_string()
    }
}

/// Personal wallet actions a player can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletAction {
    Buy,
    Sell,
    Send,
}

impl WalletAction {
    pub fn as_str(&self) -> &str {
        match self {
            WalletAction::Buy => "BUY",
            WalletAction::Sell => "SELL",
            WalletAction::Send => "SEND",
        }
    }
}

impl fmt::Display for WalletAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed wallet order. For `Send`, `symbol` carries the recipient
/// player id and `limit` the dollar amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCommand {
    pub action: WalletAction,
    pub quantity: u32,
    pub symbol: String,
    pub limit: f64,
}

impl WalletCommand {
    pub fn new(action: WalletAction, quantity: u32, symbol: impl Into<String>, limit: f64) -> Self {
        Self {
            action,
            quantity,
            symbol: symbol.into(),
            limit,
        }
    }
}

// Wallet commands key tally buckets, so the price limit takes part in
// equality: two buy proposals at different limits are distinct candidates.
// The limit is compared by bit pattern to stay usable as a hash key.
impl PartialEq for WalletCommand {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action
            && self.quantity == other.quantity
            && self.symbol == other.symbol
            && self.limit.to_bits() == other.limit.to_bits()
    }
}

impl Eq for WalletCommand {}

impl Hash for WalletCommand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.action.hash(state);
        self.quantity.hash(state);
        self.symbol.hash(state);
        self.limit.to_bits().hash(state);
    }
}

impl fmt::Display for WalletCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format!("{} {} {}", self.action, self.symbol, self.limit).trim())
    }
}

impl Candidate for WalletCommand {
    fn label(&self) -> String {
        self.to_string()
    }
}

/// Validation outcome codes shared with the layers around this core.
///
/// The validation gate only ever produces the first nine; the remaining
/// members belong to broker submission and auth but stay in the enumeration
/// for downstream compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Ok,
    CantAfford,
    BalanceTooLow,
    BadLimit,
    BadTickSize,
    BadTicker,
    NoShares,
    ExcessCashAvailable,
    InvalidCommand,
    BadAuth,
    NetWorthTooLow,
    NotEnoughVotes,
    NotEnoughBuyingPower,
    MarketClosed,
    BrokerException,
    ServerException,
    Unknown,
}

/// A player's running claim against the shared pool. Mutated only by the
/// settlement subsystem; read-only here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wallet {
    pub player_id: String,
    pub realized_return: f64,
    pub realized_decimal_return: f64,
    pub unrealized_dollars_spent: f64,
    pub sent_dollars: f64,
    pub received_dollars: f64,
}

impl Wallet {
    pub fn new(
        player_id: impl Into<String>,
        realized_return: f64,
        realized_decimal_return: f64,
        unrealized_dollars_spent: f64,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            realized_return,
            realized_decimal_return,
            unrealized_dollars_spent,
            sent_dollars: 0.0,
            received_dollars: 0.0,
        }
    }
}

/// Quote snapshot for one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub last_trade_price: f64,
    pub last_extended_hours_trade_price: f64,
    pub previous_close: f64,
}

/// Tradeable instrument metadata.
///
/// `min_tick_size` is deliberately single precision: the broker gateway
/// reports it as a 32-bit float and the limit-string formatting depends on
/// widening that exact value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub min_tick_size: f32,
    pub tradeable: bool,
}

/// Whole-account position aggregate for one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetPosition {
    pub symbol: String,
    pub shares: i64,
    pub avg_buy_price: f64,
}

/// Market session state for one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub date: NaiveDate,
    pub is_open_now: bool,
    pub is_after_hours_now: bool,
    pub is_open_this_day: bool,
}

/// Broker-side order snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub order_id: String,
    pub state: String,
    pub price: f64,
    pub average_price: f64,
    pub quantity: f64,
    pub side: String,
    pub symbol: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A player's claim on part of a shared-account order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletOrder {
    pub order_id: String,
    pub player_id: String,
    pub symbol: String,
    pub quantity: f64,
}
