//! Vote tallying and tie-breaking.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Voter;

/// Rank candidates by vote count, descending.
///
/// Mutually-tied candidates are ordered by one random permutation of their
/// tie group. A fresh random outcome per pairwise comparison would break
/// transitivity as soon as three candidates tie, so the shuffle happens per
/// group after a stable sort by count.
pub fn rank_candidates<C, R>(
    votes: HashMap<C, HashSet<Voter>>,
    rng: &mut R,
) -> Vec<(C, HashSet<Voter>)>
where
    C: Eq + Hash,
    R: Rng + ?Sized,
{
    let mut ranked: Vec<(C, HashSet<Voter>)> = votes
        .into_iter()
        .filter(|(_, voters)| !voters.is_empty())
        .collect();

    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut start = 0;
    while start < ranked.len() {
        let count = ranked[start].1.len();
        let mut end = start + 1;
        while end < ranked.len() && ranked[end].1.len() == count {
            end += 1;
        }
        ranked[start..end].shuffle(rng);
        start = end;
    }

    ranked
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn voters(names: &[&str]) -> HashSet<Voter> {
        names
            .iter()
            .map(|name| Voter::new(*name, "twitch", "#crowdbroker", false))
            .collect()
    }

    #[test]
    fn test_highest_count_ranks_first() {
        let mut votes = HashMap::new();
        votes.insert("a", voters(&["a", "b"]));
        votes.insert("b", voters(&["c"]));
        votes.insert("c", voters(&["d", "e", "f"]));

        let ranked = rank_candidates(votes, &mut ChaCha8Rng::seed_from_u64(7));

        assert_eq!(ranked[0].0, "c");
        assert_eq!(ranked[1].0, "a");
        assert_eq!(ranked[2].0, "b");
    }

    #[test]
    fn test_candidates_without_voters_are_dropped() {
        let mut votes = HashMap::new();
        votes.insert("a", voters(&["a"]));
        votes.insert("b", HashSet::new());

        let ranked = rank_candidates(votes, &mut ChaCha8Rng::seed_from_u64(7));

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "a");
    }

    #[test]
    fn test_three_way_tie_produces_consistent_ranking() {
        let mut votes = HashMap::new();
        votes.insert("a", voters(&["p1"]));
        votes.insert("b", voters(&["p2"]));
        votes.insert("c", voters(&["p3"]));
        votes.insert("d", voters(&["p4", "p5"]));

        let ranked = rank_candidates(votes, &mut ChaCha8Rng::seed_from_u64(3));

        // The clear leader is never displaced by the tie shuffle.
        assert_eq!(ranked[0].0, "d");

        // The tied group holds exactly the tied candidates, each once.
        let tied: HashSet<&str> = ranked[1..].iter().map(|(c, _)| *c).collect();
        assert_eq!(tied, ["a", "b", "c"].into_iter().collect());
    }

    #[test]
    fn test_tie_break_lets_every_tied_candidate_win() {
        let mut winners = HashSet::new();

        for seed in 0..64 {
            let mut votes = HashMap::new();
            votes.insert("a", voters(&["p1"]));
            votes.insert("b", voters(&["p2"]));
            votes.insert("c", voters(&["p3"]));

            let ranked = rank_candidates(votes, &mut ChaCha8Rng::seed_from_u64(seed));
            winners.insert(ranked[0].0);
        }

        assert_eq!(winners.len(), 3);
    }
}
