//! Election engine.
//!
//! One `Election` collects votes for one topic and round. Votes are gated by
//! eligibility, subscription and a distinct-candidate cap, persisted with
//! last-write-wins per voter, and tallied when the scheduler closes the
//! round. The durable store is authoritative for the tally; the in-memory
//! accepted-candidate set is an advisory rate limiter that is lost on
//! restart.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use rand::thread_rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::Voter;

pub mod store;
pub mod tally;

use store::{ElectionStore, VoteRecord};

/// A votable proposed action. Implementations carry their own domain
/// equality; candidates that compare equal share one tally bucket.
pub trait Candidate:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Stable display label, e.g. `BUY AMZN`.
    fn label(&self) -> String;
}

type OutcomeFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;
type WinnerCallback<C> = Box<dyn Fn(&C) + Send + Sync>;
type MessageParser<C> = Box<dyn Fn(&str) -> Option<C> + Send + Sync>;
type PreprocessorFn<C> = Box<dyn Fn(&C, &Voter) -> Option<String> + Send + Sync>;
type InstantExecutorFn<C> = Box<dyn Fn(&C, &Voter) + Send + Sync>;

/// One round of voting on a topic.
pub struct Election<C: Candidate> {
    topic: String,
    rank: u64,
    expiration: i64,
    eligible_voters: HashSet<Voter>,
    subscribers_only: bool,
    // 0 means unbounded.
    maximum_candidates: usize,
    outcomes: RwLock<HashMap<C, OutcomeFn>>,
    winner_callback: Option<WinnerCallback<C>>,
    message_parser: Option<MessageParser<C>>,
    preprocessor: Option<PreprocessorFn<C>>,
    instant_executor: Option<InstantExecutorFn<C>>,
    /// Candidates accepted this round. Cleared on outcome and lost on
    /// process restart, which restarts cap enforcement from zero.
    accepted: RwLock<HashSet<C>>,
    store: Arc<dyn ElectionStore>,
}

impl<C: Candidate> Election<C> {
    pub fn new(topic: impl Into<String>, rank: u64, store: Arc<dyn ElectionStore>) -> Self {
        Self {
            topic: topic.into(),
            rank,
            expiration: 0,
            eligible_voters: HashSet::new(),
            subscribers_only: false,
            maximum_candidates: 0,
            outcomes: RwLock::new(HashMap::new()),
            winner_callback: None,
            message_parser: None,
            preprocessor: None,
            instant_executor: None,
            accepted: RwLock::new(HashSet::new()),
            store,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn rank(&self) -> u64 {
        self.rank
    }

    pub fn expiration(&self) -> i64 {
        self.expiration
    }

    /// Identifies one round: same topic, new expiration means new round.
    pub fn election_id(&self) -> String {
        format!("{}:{}", self.topic, self.expiration)
    }

    pub fn with_expiration(mut self, expiration: i64) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_eligible_voters(mut self, eligible_voters: HashSet<Voter>) -> Self {
        self.eligible_voters = eligible_voters;
        self
    }

    pub fn with_subscribers_only(mut self, subscribers_only: bool) -> Self {
        self.subscribers_only = subscribers_only;
        self
    }

    pub fn with_maximum_candidates(mut self, maximum_candidates: usize) -> Self {
        self.maximum_candidates = maximum_candidates;
        self
    }

    pub fn with_message_parser(
        mut self,
        parser: impl Fn(&str) -> Option<C> + Send + Sync + 'static,
    ) -> Self {
        self.message_parser = Some(Box::new(parser));
        self
    }

    /// A returned message vetoes the vote and is handed back to the caller.
    pub fn with_vote_preprocessor(
        mut self,
        preprocessor: impl Fn(&C, &Voter) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.preprocessor = Some(Box::new(preprocessor));
        self
    }

    /// Every accepted vote executes immediately; nothing is persisted and no
    /// tally ever happens for this round.
    pub fn with_instant_election(
        mut self,
        executor: impl Fn(&C, &Voter) + Send + Sync + 'static,
    ) -> Self {
        self.instant_executor = Some(Box::new(executor));
        self
    }

    pub fn with_outcome(
        self,
        candidate: C,
        action: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.add_outcome(candidate, action);
        self
    }

    /// Invoked with the winning candidate after its registered action ran.
    pub fn with_winner_callback(mut self, callback: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.winner_callback = Some(Box::new(callback));
        self
    }

    pub fn add_outcome(&self, candidate: C, action: impl Fn() -> Result<()> + Send + Sync + 'static) {
        self.outcomes.write().insert(candidate, Arc::new(action));
    }

    /// Re-arm this election for the next round. A new expiration yields a
    /// fresh election id; the per-round accepted set starts empty.
    pub fn reset(&mut self, expiration: i64) {
        self.expiration = expiration;
        self.accepted.write().clear();
    }

    /// Number of distinct candidates accepted so far this round.
    pub fn accepted_candidates(&self) -> usize {
        self.accepted.read().len()
    }

    /// Handle one raw chat vote. Returns a rejection message only when the
    /// preprocessor vetoes; every other drop is silent.
    pub fn receive_vote(&self, raw_message: &str, voter: &Voter) -> Option<String> {
        let ineligible = !self.eligible_voters.is_empty() && !self.eligible_voters.contains(voter);
        let not_subscribed = self.subscribers_only && !voter.subscriber;
        let over_candidate_cap =
            self.maximum_candidates > 0 && self.accepted.read().len() >= self.maximum_candidates;

        if ineligible || not_subscribed || over_candidate_cap {
            return None;
        }

        let candidate = self.message_parser.as_ref().and_then(|parse| parse(raw_message))?;

        let already_accepted = self.accepted.read().contains(&candidate);
        if !already_accepted {
            if let Some(preprocess) = &self.preprocessor {
                if let Some(veto) = preprocess(&candidate, voter) {
                    return Some(veto);
                }
            }
        }

        if let Some(execute) = &self.instant_executor {
            execute(&candidate, voter);
            return None;
        }

        if let Err(err) = self.persist_vote(voter, &candidate) {
            warn!(
                topic = %self.topic,
                voter = %voter.player_id(),
                "failed to persist vote: {err:#}"
            );
            return None;
        }
        self.accepted.write().insert(candidate);

        None
    }

    fn persist_vote(&self, voter: &Voter, candidate: &C) -> Result<()> {
        let record = VoteRecord::new(voter, candidate, &self.election_id())?;
        self.store.save_vote(&record)
    }

    /// Live votes for this round, grouped by candidate. Voter sets are keyed
    /// by voter identity, so a voter appears at most once per candidate.
    pub fn candidate_votes(&self) -> Result<HashMap<C, HashSet<Voter>>> {
        let records = self.store.votes_for(&self.election_id())?;

        let mut votes: HashMap<C, HashSet<Voter>> = HashMap::new();
        for record in records {
            let candidate: C = match serde_json::from_str(&record.candidate_json) {
                Ok(candidate) => candidate,
                Err(_) => continue,
            };
            let voter: Voter = match serde_json::from_str(&record.voter_json) {
                Ok(voter) => voter,
                Err(_) => continue,
            };
            votes.entry(candidate).or_default().insert(voter);
        }

        Ok(votes)
    }

    /// Candidates ranked by vote count, descending; ties broken by a single
    /// random permutation per tie group.
    pub fn ranked_candidates(&self) -> Result<Vec<(C, HashSet<Voter>)>> {
        Ok(tally::rank_candidates(
            self.candidate_votes()?,
            &mut thread_rng(),
        ))
    }

    /// The latest choice of every voter in this round.
    pub fn voter_choices(&self) -> Result<HashMap<Voter, C>> {
        let mut choices = HashMap::new();
        for (candidate, voters) in self.candidate_votes()? {
            for voter in voters {
                choices.insert(voter, candidate.clone());
            }
        }
        Ok(choices)
    }

    /// Tally the round and fire the winning candidate's registered action.
    ///
    /// No votes is a no-op. Action failures are logged, never propagated,
    /// and never prevent the per-round state from being cleared.
    pub fn execute_outcome(&self) -> Result<()> {
        let ranked = self.ranked_candidates()?;

        let Some((winner, voters)) = ranked.into_iter().next() else {
            return Ok(());
        };

        info!(
            topic = %self.topic,
            winner = %winner.label(),
            votes = voters.len(),
            "executing election outcome"
        );

        let action = self.outcomes.read().get(&winner).cloned();
        if let Some(action) = action {
            if let Err(err) = action() {
                warn!(
                    topic = %self.topic,
                    winner = %winner.label(),
                    "outcome action failed: {err:#}"
                );
            }
        }

        self.accepted.write().clear();

        if let Some(callback) = &self.winner_callback {
            callback(&winner);
        }

        Ok(())
    }
}
