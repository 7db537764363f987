//! Crowdbroker backend library.
//!
//! A crowd of chat voters steers a shared brokerage account: the election
//! engine collects and tallies votes for proposed actions, and the order
//! validation gate decides from market and ledger snapshots whether the
//! winning action is currently legal before it may reach a broker.

pub mod commands;
pub mod config;
pub mod election;
pub mod market;
pub mod models;
pub mod orders;

pub use config::Config;
