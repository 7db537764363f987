//! Runtime configuration.

use anyhow::Result;

/// Application configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the sqlite vote store.
    pub database_path: String,
    /// Global per-player influence cap in dollars.
    pub max_influenced_buy: f64,
    /// Seconds between election tallies.
    pub tally_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./crowdbroker.db".to_string());

        let max_influenced_buy = std::env::var("MAX_INFLUENCED_BUY")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000.0);

        let tally_interval_secs = std::env::var("TALLY_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        Ok(Self {
            database_path,
            max_influenced_buy,
            tally_interval_secs,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./crowdbroker.db".to_string(),
            max_influenced_buy: 3000.0,
            tally_interval_secs: 60,
        }
    }
}
