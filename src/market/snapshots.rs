//! Fixed in-memory snapshots.
//!
//! One struct implementing every provider contract, filled with whatever the
//! caller needs. The demo binary wires its elections against it and tests
//! use it in place of a mocking framework.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use crate::models::{
    AssetPosition, BrokerOrder, Instrument, MarketState, Quote, Wallet, WalletOrder,
    PENDING_ORDER_STATES,
};

use super::{
    AccountBalanceProvider, BrokerOrderProvider, InstrumentProvider, MarketStateProvider,
    PositionProvider, QuoteProvider, WalletOrderProvider, WalletStore,
};

#[derive(Default)]
pub struct StaticSnapshots {
    pub cash: f64,
    pub quotes: HashMap<String, Quote>,
    pub instruments: HashMap<String, Instrument>,
    pub positions: HashMap<String, AssetPosition>,
    pub liable_players: HashMap<String, HashSet<String>>,
    pub broker_orders: Vec<BrokerOrder>,
    pub wallet_orders: Vec<WalletOrder>,
    pub wallets: HashMap<String, Wallet>,
    pub market_states: HashMap<NaiveDate, MarketState>,
}

impl StaticSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cash(mut self, cash: f64) -> Self {
        self.cash = cash;
        self
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quotes.insert(quote.symbol.clone(), quote);
        self
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instruments.insert(instrument.symbol.clone(), instrument);
        self
    }

    pub fn with_position(mut self, symbol: impl Into<String>, shares: i64) -> Self {
        let symbol = symbol.into();
        self.positions.insert(
            symbol.clone(),
            AssetPosition {
                symbol,
                shares,
                avg_buy_price: 0.0,
            },
        );
        self
    }

    pub fn with_liable_player(
        mut self,
        symbol: impl Into<String>,
        player_id: impl Into<String>,
    ) -> Self {
        self.liable_players
            .entry(symbol.into())
            .or_default()
            .insert(player_id.into());
        self
    }

    pub fn with_broker_order(mut self, order: BrokerOrder) -> Self {
        self.broker_orders.push(order);
        self
    }

    pub fn with_wallet_order(mut self, order: WalletOrder) -> Self {
        self.wallet_orders.push(order);
        self
    }

    pub fn with_wallet(mut self, wallet: Wallet) -> Self {
        self.wallets.insert(wallet.player_id.clone(), wallet);
        self
    }

    pub fn with_market_state(mut self, state: MarketState) -> Self {
        self.market_states.insert(state.date, state);
        self
    }
}

impl AccountBalanceProvider for StaticSnapshots {
    fn uncommitted_cash(&self) -> Result<f64> {
        Ok(self.cash)
    }
}

impl QuoteProvider for StaticSnapshots {
    fn quote(&self, symbol: &str) -> Result<Quote> {
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("no quote for {symbol}"))
    }
}

impl InstrumentProvider for StaticSnapshots {
    fn valid_symbols(&self) -> Result<HashSet<String>> {
        Ok(self.instruments.keys().cloned().collect())
    }

    fn instrument(&self, symbol: &str) -> Result<Instrument> {
        self.instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("no instrument for {symbol}"))
    }
}

impl PositionProvider for StaticSnapshots {
    fn positions(&self) -> Result<HashMap<String, AssetPosition>> {
        Ok(self.positions.clone())
    }

    fn liable_players(&self, symbol: &str) -> Result<HashSet<String>> {
        Ok(self.liable_players.get(symbol).cloned().unwrap_or_default())
    }
}

impl BrokerOrderProvider for StaticSnapshots {
    fn pending_orders_since(&self, since: NaiveDate) -> Result<Vec<BrokerOrder>> {
        Ok(self
            .broker_orders
            .iter()
            .filter(|order| PENDING_ORDER_STATES.contains(order.state.to_lowercase().as_str()))
            .filter(|order| match order.created_at {
                Some(created_at) => created_at.date_naive() >= since,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn orders_by_id(&self, order_ids: &HashSet<String>) -> Result<Vec<BrokerOrder>> {
        Ok(self
            .broker_orders
            .iter()
            .filter(|order| order_ids.contains(&order.order_id))
            .cloned()
            .collect())
    }
}

impl WalletOrderProvider for StaticSnapshots {
    fn unmatched_filled_buy_orders_for_symbol(&self, symbol: &str) -> Result<Vec<WalletOrder>> {
        Ok(self
            .wallet_orders
            .iter()
            .filter(|order| order.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect())
    }

    fn unmatched_filled_buy_orders(
        &self,
        player_id: &str,
        symbol: &str,
    ) -> Result<Vec<WalletOrder>> {
        Ok(self
            .wallet_orders
            .iter()
            .filter(|order| order.player_id == player_id)
            .filter(|order| order.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect())
    }

    fn unsold_or_pending_buy_orders(&self, player_id: &str) -> Result<Vec<WalletOrder>> {
        Ok(self
            .wallet_orders
            .iter()
            .filter(|order| order.player_id == player_id)
            .cloned()
            .collect())
    }
}

impl WalletStore for StaticSnapshots {
    fn wallet(&self, player_id: &str) -> Result<Wallet> {
        Ok(self.wallets.get(player_id).cloned().unwrap_or_else(|| Wallet {
            player_id: player_id.to_string(),
            ..Wallet::default()
        }))
    }

    fn wallets(&self, player_ids: &HashSet<String>) -> Result<Vec<Wallet>> {
        Ok(player_ids
            .iter()
            .filter_map(|player_id| self.wallets.get(player_id))
            .cloned()
            .collect())
    }
}

impl MarketStateProvider for StaticSnapshots {
    fn market_state(&self, date: NaiveDate) -> Result<MarketState> {
        self.market_states
            .get(&date)
            .cloned()
            .ok_or_else(|| anyhow!("no market state for {date}"))
    }
}
