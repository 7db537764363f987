//! Order and wallet command validation.
//!
//! The gate between a decided command and broker submission: pure, read-only
//! decision functions over externally supplied snapshots. Nothing here
//! mutates state or reserves shares or cash between validation and the
//! execution step that follows, so two validated sells can still race for
//! the same shares; callers own that window.
//!
//! Normal rejections come back as an [`OrderStatus`]; a collaborator that
//! cannot produce its snapshot fails the whole validation attempt instead of
//! being treated as a pass.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::market::clock::{start_of_today, MarketClock};
use crate::market::quotes::most_recent_price;
use crate::market::{
    AccountBalanceProvider, BrokerOrderProvider, InstrumentProvider, PositionProvider,
    QuoteProvider, WalletOrderProvider, WalletStore,
};
use crate::models::{OrderStatus, Quote, TradeAction, TradeCommand, Voter, WalletAction, WalletCommand};

pub mod wallet;

use wallet::WalletLedger;

pub struct OrderValidator {
    balance: Arc<dyn AccountBalanceProvider>,
    quotes: Arc<dyn QuoteProvider>,
    instruments: Arc<dyn InstrumentProvider>,
    positions: Arc<dyn PositionProvider>,
    broker_orders: Arc<dyn BrokerOrderProvider>,
    wallet_orders: Arc<dyn WalletOrderProvider>,
    wallets: Arc<dyn WalletStore>,
    ledger: WalletLedger,
    clock: MarketClock,
}

impl OrderValidator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        balance: Arc<dyn AccountBalanceProvider>,
        quotes: Arc<dyn QuoteProvider>,
        instruments: Arc<dyn InstrumentProvider>,
        positions: Arc<dyn PositionProvider>,
        broker_orders: Arc<dyn BrokerOrderProvider>,
        wallet_orders: Arc<dyn WalletOrderProvider>,
        wallets: Arc<dyn WalletStore>,
        clock: MarketClock,
        max_influenced_buy: f64,
    ) -> Self {
        let ledger = WalletLedger::new(
            wallets.clone(),
            wallet_orders.clone(),
            broker_orders.clone(),
            max_influenced_buy,
        );
        Self {
            balance,
            quotes,
            instruments,
            positions,
            broker_orders,
            wallet_orders,
            wallets,
            ledger,
            clock,
        }
    }

    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    /// Decide whether a crowd trade command is currently legal for the
    /// shared account, given the voters requesting it.
    pub fn validate_trade(
        &self,
        command: &TradeCommand,
        voters: &HashSet<Voter>,
    ) -> Result<OrderStatus> {
        if !self.instruments.valid_symbols()?.contains(&command.symbol) {
            return Ok(OrderStatus::BadTicker);
        }

        match command.action {
            TradeAction::Buy => {
                let quote = self.quotes.quote(&command.symbol)?;
                let buy_limit = self.buy_order_ceiling(&quote)?;

                if buy_limit > self.balance.uncommitted_cash()? {
                    return Ok(OrderStatus::CantAfford);
                }

                Ok(OrderStatus::Ok)
            }
            TradeAction::Sell => self.validate_sell(command, voters),
            TradeAction::Skip => Ok(OrderStatus::Ok),
        }
    }

    fn validate_sell(&self, command: &TradeCommand, voters: &HashSet<Voter>) -> Result<OrderStatus> {
        let symbol = &command.symbol;

        let positions = self.positions.positions()?;
        let Some(position) = positions.get(symbol) else {
            return Ok(OrderStatus::NoShares);
        };
        let total_owned_shares = position.shares;

        // Selling shares the crowd could instead have bought with unused
        // influence is blocked unless a requesting voter already has a claim
        // on this position.
        let global_cash = self.balance.uncommitted_cash()?;
        let player_ids: HashSet<String> = voters.iter().map(|voter| voter.player_id()).collect();
        let liable_players = self.positions.liable_players(symbol)?;
        let players_own_position = player_ids
            .iter()
            .any(|player_id| liable_players.contains(player_id));
        let voter_buying_power = self.ledger.buying_power_for(&player_ids)?;

        if !players_own_position && voter_buying_power < global_cash {
            return Ok(OrderStatus::ExcessCashAvailable);
        }

        let open_player_orders = self
            .wallet_orders
            .unmatched_filled_buy_orders_for_symbol(symbol)?;
        let pending_orders = self.broker_orders.pending_orders_since(start_of_today())?;

        let pending_sale_shares: i64 = pending_orders
            .iter()
            .filter(|order| order.symbol.eq_ignore_ascii_case(symbol))
            .filter(|order| order.side.eq_ignore_ascii_case("sell"))
            .map(|order| order.quantity as i64)
            .sum();
        let player_claimed_shares: i64 = open_player_orders
            .iter()
            .map(|order| order.quantity as i64)
            .sum();

        debug!(
            %symbol,
            pending_sale_shares,
            player_claimed_shares,
            total_owned_shares,
            "sell preflight share ledger"
        );

        if total_owned_shares - player_claimed_shares - pending_sale_shares <= 0 {
            return Ok(OrderStatus::NoShares);
        }

        Ok(OrderStatus::Ok)
    }

    /// Decide whether a player's personal wallet command is currently legal.
    pub fn validate_wallet(&self, player_id: &str, command: &WalletCommand) -> Result<OrderStatus> {
        let wallet = self.wallets.wallet(player_id)?;

        match command.action {
            WalletAction::Buy => {
                let quote = self.quotes.quote(&command.symbol)?;
                let instrument = self.instruments.instrument(&command.symbol)?;

                let buy_limit = command.limit;
                let purchase_total = command.limit * f64::from(command.quantity);

                let player_spending_balance = self.ledger.spending_balance(&wallet)?;
                if purchase_total > player_spending_balance {
                    return Ok(OrderStatus::BalanceTooLow);
                }

                if purchase_total > self.balance.uncommitted_cash()? {
                    return Ok(OrderStatus::CantAfford);
                }

                let price = most_recent_price(&quote);
                let buy_ceiling = price + price * 0.01;
                let buy_floor = price - price * 0.10;

                if buy_limit > buy_ceiling || buy_limit < buy_floor {
                    return Ok(OrderStatus::BadLimit);
                }

                if instrument.min_tick_size > 0.0 {
                    let limit_cents = (buy_limit * 100.0).round() as i64;
                    if !tick_aligned(limit_cents, instrument.min_tick_size) {
                        return Ok(OrderStatus::BadTickSize);
                    }
                }

                Ok(OrderStatus::Ok)
            }
            WalletAction::Sell => {
                let quote = self.quotes.quote(&command.symbol)?;
                let instrument = self.instruments.instrument(&command.symbol)?;

                let sell_limit = command.limit;
                let price = most_recent_price(&quote);
                let sell_floor = price - price * 0.01;

                if sell_limit < sell_floor {
                    return Ok(OrderStatus::BadLimit);
                }

                if instrument.min_tick_size > 0.0 {
                    // Cents are truncated here but rounded on the buy side;
                    // the asymmetry is intentional.
                    let limit_cents = (sell_limit * 100.0) as i64;
                    if !tick_aligned(limit_cents, instrument.min_tick_size) {
                        return Ok(OrderStatus::BadTickSize);
                    }
                }

                if !self.positions.positions()?.contains_key(&command.symbol) {
                    return Ok(OrderStatus::NoShares);
                }

                let open_wallet_orders = self
                    .wallet_orders
                    .unmatched_filled_buy_orders(&wallet.player_id, &command.symbol)?;
                if (open_wallet_orders.len() as u32) < command.quantity {
                    return Ok(OrderStatus::NoShares);
                }

                Ok(OrderStatus::Ok)
            }
            WalletAction::Send => {
                let send_amount = command.limit;

                if send_amount < 0.0 {
                    return Ok(OrderStatus::InvalidCommand);
                }

                // The parameter carries the recipient player id.
                if wallet.player_id.eq_ignore_ascii_case(&command.symbol) {
                    return Ok(OrderStatus::InvalidCommand);
                }

                if send_amount > self.ledger.spending_balance(&wallet)? {
                    return Ok(OrderStatus::BalanceTooLow);
                }

                Ok(OrderStatus::Ok)
            }
        }
    }

    /// Highest price a crowd buy may execute at. The premium narrows after
    /// hours and disappears entirely for expensive symbols.
    pub fn buy_order_ceiling(&self, quote: &Quote) -> Result<f64> {
        let price = most_recent_price(quote);

        let mut ceiling_percentage = 0.05;
        if self.clock.is_after_hours()? {
            ceiling_percentage = 0.001;
        }
        if price >= 250.0 {
            ceiling_percentage = 0.0;
        }

        Ok(price + price * ceiling_percentage)
    }

    /// Lowest price a crowd sell may execute at; mirrors the buy ceiling.
    pub fn sell_order_floor(&self, quote: &Quote) -> Result<f64> {
        let price = most_recent_price(quote);

        let mut floor_percentage = 0.03;
        if self.clock.is_after_hours()? {
            floor_percentage = 0.001;
        }
        if price >= 250.0 {
            floor_percentage = 0.0;
        }

        Ok(price - price * floor_percentage)
    }
}

fn tick_aligned(limit_cents: i64, min_tick_size: f32) -> bool {
    let tick_cents = (min_tick_size * 100.0) as i64;
    tick_cents <= 0 || limit_cents % tick_cents == 0
}

/// Format a limit as the two-decimal string the broker gateway accepts,
/// honoring the instrument's minimum tick size: round to the nearest tick,
/// then force the final cents digit to the tick's own final digit.
pub fn limit_order_string(limit: f64, min_tick_size: f32) -> String {
    let min_tick_size_str = format!("{:.2}", min_tick_size);
    let order_limit = round_to_tick(limit, min_tick_size);

    let mut limit_str = format!("{:.2}", order_limit);
    let tick_digit = min_tick_size_str.chars().last().unwrap_or('0');
    limit_str.pop();
    limit_str.push(tick_digit);

    limit_str
}

fn round_to_tick(limit: f64, min_tick_size: f32) -> f64 {
    let tick = f64::from(min_tick_size);
    if tick <= 0.0 {
        return limit;
    }
    (limit / tick).round() * tick
}
