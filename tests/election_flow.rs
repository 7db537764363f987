//! End-to-end election flow against a sqlite store: votes come in over a
//! validating preprocessor, the tally closes, and the winning command's
//! registered action fires exactly once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crowdbroker_backend::election::store::{ElectionStore, SqliteElectionStore};
use crowdbroker_backend::election::Election;
use crowdbroker_backend::market::clock::{start_of_today, MarketClock};
use crowdbroker_backend::market::snapshots::StaticSnapshots;
use crowdbroker_backend::models::{
    Instrument, MarketState, OrderStatus, Quote, TradeAction, TradeCommand, Voter,
};
use crowdbroker_backend::orders::OrderValidator;

fn snapshots() -> StaticSnapshots {
    StaticSnapshots::new()
        .with_cash(5000.0)
        .with_market_state(MarketState {
            date: start_of_today(),
            is_open_now: true,
            is_after_hours_now: false,
            is_open_this_day: true,
        })
        .with_quote(Quote {
            symbol: "AMZN".to_string(),
            last_trade_price: 182.41,
            last_extended_hours_trade_price: 0.0,
            previous_close: 180.11,
        })
        .with_instrument(Instrument {
            symbol: "AMZN".to_string(),
            min_tick_size: 0.0,
            tradeable: true,
        })
}

fn validator(snapshots: Arc<StaticSnapshots>) -> Arc<OrderValidator> {
    Arc::new(OrderValidator::new(
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        snapshots.clone(),
        MarketClock::new(snapshots),
        3000.0,
    ))
}

fn voter(name: &str) -> Voter {
    Voter::new(name, "twitch", "#crowdbroker", false)
}

#[test]
fn election_over_sqlite_executes_majority_winner() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("votes.db");
    let store = Arc::new(SqliteElectionStore::new(db_path.to_str().unwrap()).unwrap());

    let snapshots = Arc::new(snapshots());
    let validator = validator(snapshots);

    let buys = Arc::new(AtomicUsize::new(0));
    let sells = Arc::new(AtomicUsize::new(0));

    let preprocessor = {
        let validator = validator.clone();
        move |command: &TradeCommand, voter: &Voter| -> Option<String> {
            let requesting: HashSet<Voter> = [voter.clone()].into_iter().collect();
            match validator.validate_trade(command, &requesting) {
                Ok(OrderStatus::Ok) => None,
                Ok(status) => Some(format!("{:?}", status)),
                Err(err) => Some(format!("{err:#}")),
            }
        }
    };

    let buy_counter = buys.clone();
    let sell_counter = sells.clone();
    let election = Election::new("buysell", 1, store.clone())
        .with_expiration(1_700_000_000_000)
        .with_message_parser(crowdbroker_backend::commands::parse_trade_vote)
        .with_vote_preprocessor(preprocessor)
        .with_outcome(TradeCommand::new(TradeAction::Buy, "AMZN"), move || {
            buy_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_outcome(TradeCommand::new(TradeAction::Sell, "AMZN"), move || {
            sell_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    assert_eq!(election.receive_vote("!buy AMZN", &voter("p1")), None);
    assert_eq!(election.receive_vote("!buy amzn", &voter("p2")), None);
    assert_eq!(election.receive_vote("!sell AMZN", &voter("p3")), None);

    // p2 changes their mind; only the latest vote counts, so the tally
    // becomes BUY 1, SELL 2.
    assert_eq!(election.receive_vote("!sell AMZN", &voter("p2")), None);

    // Chatter that parses to nothing is dropped silently.
    assert_eq!(election.receive_vote("to the moon", &voter("p4")), None);

    // An unknown ticker is vetoed with the validator's status.
    assert_eq!(
        election.receive_vote("!buy DOGE", &voter("p5")),
        Some("BadTicker".to_string())
    );

    election.execute_outcome().unwrap();

    assert_eq!(buys.load(Ordering::SeqCst), 0);
    assert_eq!(sells.load(Ordering::SeqCst), 1);
}

#[test]
fn election_rounds_are_isolated_by_expiration() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("votes.db");
    let store = Arc::new(SqliteElectionStore::new(db_path.to_str().unwrap()).unwrap());

    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();

    let mut election = Election::new("buysell", 1, store)
        .with_expiration(1_700_000_000_000)
        .with_message_parser(crowdbroker_backend::commands::parse_trade_vote)
        .with_outcome(TradeCommand::new(TradeAction::Buy, "AMZN"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    election.receive_vote("!buy AMZN", &voter("p1"));
    election.execute_outcome().unwrap();
    assert_eq!(executed.load(Ordering::SeqCst), 1);

    // The next round has a fresh election id; the old votes stay behind.
    election.reset(1_700_000_060_000);
    assert!(election.ranked_candidates().unwrap().is_empty());

    election.execute_outcome().unwrap();
    assert_eq!(executed.load(Ordering::SeqCst), 1);

    election.receive_vote("!buy AMZN", &voter("p9"));
    election.execute_outcome().unwrap();
    assert_eq!(executed.load(Ordering::SeqCst), 2);
}

#[test]
fn votes_survive_a_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("votes.db");

    {
        let store = Arc::new(SqliteElectionStore::new(db_path.to_str().unwrap()).unwrap());
        let election = Election::<TradeCommand>::new("buysell", 1, store)
            .with_expiration(42)
            .with_message_parser(crowdbroker_backend::commands::parse_trade_vote);

        election.receive_vote("!buy AMZN", &voter("p1"));
        election.receive_vote("!buy AMZN", &voter("p2"));
    }

    let store = Arc::new(SqliteElectionStore::new(db_path.to_str().unwrap()).unwrap());
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();

    let election = Election::new("buysell", 1, store)
        .with_expiration(42)
        .with_message_parser(crowdbroker_backend::commands::parse_trade_vote)
        .with_outcome(TradeCommand::new(TradeAction::Buy, "AMZN"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    let votes = election.candidate_votes().unwrap();
    assert_eq!(votes[&TradeCommand::new(TradeAction::Buy, "AMZN")].len(), 2);

    election.execute_outcome().unwrap();
    assert_eq!(executed.load(Ordering::SeqCst), 1);
}
