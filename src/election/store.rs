//! Durable vote storage.
//!
//! The store is the source of truth for tallies. A vote's primary key is
//! `election_id:player_id`, so writing a vote for the same pair replaces the
//! previous one: at most one live vote per voter per election, last write
//! wins. Concurrent votes from different voters never conflict.

use std::collections::HashMap;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::models::Voter;

/// One persisted vote: candidate and voter serialized as JSON alongside the
/// identifiers used for lookups.
#[derive(Debug, Clone)]
pub struct VoteRecord {
    pub vote_id: String,
    pub player_id: String,
    pub election_id: String,
    pub candidate_json: String,
    pub voter_json: String,
}

impl VoteRecord {
    pub fn new<C: Serialize>(voter: &Voter, candidate: &C, election_id: &str) -> Result<Self> {
        Ok(Self {
            vote_id: format!("{}:{}", election_id, voter.player_id()),
            player_id: voter.player_id(),
            election_id: election_id.to_string(),
            candidate_json: serde_json::to_string(candidate).context("serializing candidate")?,
            voter_json: serde_json::to_string(voter).context("serializing voter")?,
        })
    }
}

/// Election round metadata archived for inspection of past rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionRow {
    pub topic: String,
    pub expiration: i64,
    pub rank: u64,
}

pub trait ElectionStore: Send + Sync {
    fn save_vote(&self, vote: &VoteRecord) -> Result<()>;
    fn votes_for(&self, election_id: &str) -> Result<Vec<VoteRecord>>;
    fn archive_election(&self, row: &ElectionRow) -> Result<()>;
    fn election(&self, topic: &str) -> Result<Option<ElectionRow>>;
}

/// Sqlite-backed store used by the binary.
pub struct SqliteElectionStore {
    conn: Mutex<Connection>,
}

impl SqliteElectionStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening election store at {db_path}"))?;
        Self::initialize(conn)
    }

    /// Private in-memory database, handy in tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS election_votes (
                vote_id TEXT PRIMARY KEY,
                player_id TEXT NOT NULL,
                election_id TEXT NOT NULL,
                vote_object TEXT NOT NULL,
                voter_object TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_votes_election ON election_votes(election_id)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS elections (
                topic TEXT PRIMARY KEY,
                expiration INTEGER NOT NULL,
                rank INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ElectionStore for SqliteElectionStore {
    fn save_vote(&self, vote: &VoteRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO election_votes
             (vote_id, player_id, election_id, vote_object, voter_object)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                vote.vote_id,
                vote.player_id,
                vote.election_id,
                vote.candidate_json,
                vote.voter_json
            ],
        )
        .context("saving vote")?;
        Ok(())
    }

    fn votes_for(&self, election_id: &str) -> Result<Vec<VoteRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT vote_id, player_id, election_id, vote_object, voter_object
             FROM election_votes WHERE election_id = ?1",
        )?;

        let votes = stmt
            .query_map([election_id], |row| {
                Ok(VoteRecord {
                    vote_id: row.get(0)?,
                    player_id: row.get(1)?,
                    election_id: row.get(2)?,
                    candidate_json: row.get(3)?,
                    voter_json: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(votes)
    }

    fn archive_election(&self, row: &ElectionRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO elections (topic, expiration, rank) VALUES (?1, ?2, ?3)",
            params![row.topic, row.expiration, row.rank as i64],
        )
        .context("archiving election")?;
        Ok(())
    }

    fn election(&self, topic: &str) -> Result<Option<ElectionRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT topic, expiration, rank FROM elections WHERE topic = ?1",
                [topic],
                |row| {
                    Ok(ElectionRow {
                        topic: row.get(0)?,
                        expiration: row.get(1)?,
                        rank: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }
}

/// In-memory store for tests and throwaway runs; contents do not survive the
/// process.
#[derive(Default)]
pub struct MemoryElectionStore {
    votes: RwLock<HashMap<String, VoteRecord>>,
    elections: RwLock<HashMap<String, ElectionRow>>,
}

impl ElectionStore for MemoryElectionStore {
    fn save_vote(&self, vote: &VoteRecord) -> Result<()> {
        self.votes.write().insert(vote.vote_id.clone(), vote.clone());
        Ok(())
    }

    fn votes_for(&self, election_id: &str) -> Result<Vec<VoteRecord>> {
        Ok(self
            .votes
            .read()
            .values()
            .filter(|vote| vote.election_id == election_id)
            .cloned()
            .collect())
    }

    fn archive_election(&self, row: &ElectionRow) -> Result<()> {
        self.elections.write().insert(row.topic.clone(), row.clone());
        Ok(())
    }

    fn election(&self, topic: &str) -> Result<Option<ElectionRow>> {
        Ok(self.elections.read().get(topic).cloned())
    }
}
