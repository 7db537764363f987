//! Wallet ledger arithmetic: spending balances and buying power.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use crate::market::{BrokerOrderProvider, WalletOrderProvider, WalletStore};
use crate::models::{Wallet, PENDING_ORDER_STATES};

/// Computes a player's claims against the shared pool from ledger fields and
/// in-flight orders. Read-only; the settlement subsystem owns the writes.
pub struct WalletLedger {
    wallets: Arc<dyn WalletStore>,
    wallet_orders: Arc<dyn WalletOrderProvider>,
    broker_orders: Arc<dyn BrokerOrderProvider>,
    /// Global per-player influence cap, threaded from config.
    max_influenced_buy: f64,
}

impl WalletLedger {
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        wallet_orders: Arc<dyn WalletOrderProvider>,
        broker_orders: Arc<dyn BrokerOrderProvider>,
        max_influenced_buy: f64,
    ) -> Self {
        Self {
            wallets,
            wallet_orders,
            broker_orders,
            max_influenced_buy,
        }
    }

    pub fn max_influenced_buy(&self) -> f64 {
        self.max_influenced_buy
    }

    /// Dollars the player can still spend: realized returns minus funds held
    /// by open buy orders, adjusted for transfers, less any spend over the
    /// influence cap.
    pub fn spending_balance(&self, wallet: &Wallet) -> Result<f64> {
        let open_orders = self
            .wallet_orders
            .unsold_or_pending_buy_orders(&wallet.player_id)?;
        let order_ids: HashSet<String> = open_orders
            .iter()
            .map(|order| order.order_id.clone())
            .collect();
        let broker_orders = self.broker_orders.orders_by_id(&order_ids)?;

        let mut spent_amount = 0.0;
        for order in &broker_orders {
            if order.state.eq_ignore_ascii_case("filled") {
                spent_amount += order.average_price;
            } else if PENDING_ORDER_STATES.contains(order.state.to_lowercase().as_str()) {
                spent_amount += order.price;
            }
        }

        let mut spending_balance = wallet.realized_return - spent_amount;

        if wallet.unrealized_dollars_spent > self.max_influenced_buy {
            spending_balance -= wallet.unrealized_dollars_spent - self.max_influenced_buy;
        }

        spending_balance += wallet.received_dollars - wallet.sent_dollars;

        Ok(spending_balance)
    }

    /// The player's unused share of the global influence cap. May be
    /// negative; callers that aggregate only count positive shares.
    pub fn buying_power(&self, wallet: &Wallet) -> f64 {
        self.max_influenced_buy - wallet.unrealized_dollars_spent - wallet.realized_return
    }

    /// Combined buying power of a set of players. Players with no wallet on
    /// record are assumed to have their full, unspent quota.
    pub fn buying_power_for(&self, player_ids: &HashSet<String>) -> Result<f64> {
        let wallets = self.wallets.wallets(player_ids)?;

        let mut total_buying_power = 0.0;
        let mut players_without_wallet: HashSet<&str> =
            player_ids.iter().map(String::as_str).collect();

        for wallet in &wallets {
            players_without_wallet.remove(wallet.player_id.as_str());
            let buying_power = self.buying_power(wallet);
            if buying_power > 0.0 {
                total_buying_power += buying_power;
            }
        }

        total_buying_power += players_without_wallet.len() as f64 * self.max_influenced_buy;

        Ok(total_buying_power)
    }
}
