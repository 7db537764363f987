//! crowdbroker - crowd-voted trading election loop.
//!
//! Reads votes from stdin as `<username> <vote text>` lines, runs one trade
//! election per tally interval against a fixed market snapshot, and logs the
//! winning command each round. The brokerage gateway itself lives outside
//! this binary.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crowdbroker_backend::commands::parse_trade_vote;
use crowdbroker_backend::election::store::{ElectionRow, ElectionStore, SqliteElectionStore};
use crowdbroker_backend::election::{Candidate, Election};
use crowdbroker_backend::market::clock::{start_of_today, MarketClock};
use crowdbroker_backend::market::snapshots::StaticSnapshots;
use crowdbroker_backend::models::{
    Instrument, MarketState, OrderStatus, Quote, TradeCommand, Voter,
};
use crowdbroker_backend::orders::OrderValidator;
use crowdbroker_backend::Config;

#[derive(Parser, Debug)]
#[command(name = "crowdbroker", about = "Crowd-voted trading election loop")]
struct Args {
    /// Sqlite vote store path (overrides DATABASE_PATH).
    #[arg(long)]
    db: Option<String>,

    /// Election topic.
    #[arg(long, default_value = "buysell")]
    topic: String,

    /// Seconds between tallies (overrides TALLY_INTERVAL_SECS).
    #[arg(long)]
    tally_interval: Option<u64>,

    /// Restrict voting to subscribers.
    #[arg(long, default_value_t = false)]
    subscribers_only: bool,

    /// Distinct candidates allowed per round (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    max_candidates: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = args.db.as_deref() {
        config.database_path = db.to_string();
    }
    if let Some(secs) = args.tally_interval {
        config.tally_interval_secs = secs;
    }

    init_tracing();
    info!("crowdbroker starting");

    let store: Arc<dyn ElectionStore> = Arc::new(
        SqliteElectionStore::new(&config.database_path)
            .context("opening election store")?,
    );
    info!(path = %config.database_path, "election store ready");

    let snapshots = Arc::new(demo_snapshots());
    let validator = Arc::new(OrderValidator::new(
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        MarketClock::new(snapshots),
        config.max_influenced_buy,
    ));

    let election = build_trade_election(&args, &config, store.clone(), validator);
    let election = Arc::new(Mutex::new(election));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tally = interval(Duration::from_secs(config.tally_interval_secs));
    // The first tick fires immediately; consume it so round one gets a full
    // voting window.
    tally.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => handle_vote(&election, &line),
                    None => break,
                }
            }
            _ = tally.tick() => {
                close_round(&election, store.as_ref(), config.tally_interval_secs)?;
            }
        }
    }

    // Tally whatever is left once the vote stream closes.
    close_round(&election, store.as_ref(), config.tally_interval_secs)?;
    info!("vote stream closed, shutting down");

    Ok(())
}

fn build_trade_election(
    args: &Args,
    config: &Config,
    store: Arc<dyn ElectionStore>,
    validator: Arc<OrderValidator>,
) -> Election<TradeCommand> {
    let preprocessor = move |command: &TradeCommand, voter: &Voter| -> Option<String> {
        let requesting: HashSet<Voter> = [voter.clone()].into_iter().collect();
        match validator.validate_trade(command, &requesting) {
            Ok(OrderStatus::Ok) => None,
            Ok(status) => Some(format!("{} rejected: {:?}", command.label(), status)),
            Err(err) => {
                warn!(command = %command.label(), "validation unavailable: {err:#}");
                Some(format!("{} could not be validated, try again", command.label()))
            }
        }
    };

    Election::new(&args.topic, 1, store)
        .with_expiration(next_expiration(config.tally_interval_secs))
        .with_subscribers_only(args.subscribers_only)
        .with_maximum_candidates(args.max_candidates)
        .with_message_parser(parse_trade_vote)
        .with_vote_preprocessor(preprocessor)
        .with_winner_callback(|winner: &TradeCommand| {
            info!(winner = %winner.label(), "winning command ready for broker gateway");
        })
}

fn handle_vote(election: &Mutex<Election<TradeCommand>>, line: &str) {
    let Some((username, message)) = line.split_once(char::is_whitespace) else {
        return;
    };

    let voter = Voter::new(username, "console", "#crowdbroker", true);
    if let Some(reply) = election.lock().receive_vote(message.trim(), &voter) {
        info!(%username, "{reply}");
    }
}

fn close_round(
    election: &Mutex<Election<TradeCommand>>,
    store: &dyn ElectionStore,
    interval_secs: u64,
) -> Result<()> {
    let mut election = election.lock();

    election.execute_outcome()?;

    store.archive_election(&ElectionRow {
        topic: election.topic().to_string(),
        expiration: election.expiration(),
        rank: election.rank(),
    })?;

    election.reset(next_expiration(interval_secs));
    Ok(())
}

fn next_expiration(interval_secs: u64) -> i64 {
    Utc::now().timestamp_millis() + (interval_secs as i64) * 1000
}

/// Fixed market snapshot backing the demo loop. Real quote, instrument and
/// ledger providers plug in through the same traits.
fn demo_snapshots() -> StaticSnapshots {
    let mut snapshots = StaticSnapshots::new()
        .with_cash(10_000.0)
        .with_market_state(MarketState {
            date: start_of_today(),
            is_open_now: true,
            is_after_hours_now: false,
            is_open_this_day: true,
        });

    for (symbol, price, min_tick_size) in [
        ("AMZN", 182.41, 0.0f32),
        ("TSLA", 244.12, 0.0),
        ("GME", 23.86, 0.01),
        ("F", 11.08, 0.01),
    ] {
        snapshots = snapshots
            .with_quote(Quote {
                symbol: symbol.to_string(),
                last_trade_price: price,
                last_extended_hours_trade_price: 0.0,
                previous_close: price,
            })
            .with_instrument(Instrument {
                symbol: symbol.to_string(),
                min_tick_size,
                tradeable: true,
            });
    }

    snapshots
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
