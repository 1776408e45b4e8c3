use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::services::errors::pick_pool_errors::PickError;
use crate::services::selector::{distinct, select_with_preference, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Tagger,
    Angel,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Tagger => write!(f, "tagger"),
            Role::Angel => write!(f, "angel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRound {
    pub taggers: Vec<String>,
    pub angels: Vec<String>,
}

/// Per-session pick state for the tagger and angel roles.
///
/// With the exclusion policy on, a drawn name leaves its role's available
/// pool until the pool runs dry, at which point the pool is refilled from the
/// participant list. With the policy off the pools never shrink.
#[derive(Debug, Clone)]
pub struct PickPools {
    participants: Vec<String>,
    tagger_available: Vec<String>,
    angel_available: Vec<String>,
    exclusion: bool,
}

impl PickPools {
    pub fn new(participants: &[String], exclusion: bool) -> Self {
        let participants = distinct(participants);
        PickPools {
            tagger_available: participants.clone(),
            angel_available: participants.clone(),
            participants,
            exclusion,
        }
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn exclusion(&self) -> bool {
        self.exclusion
    }

    pub fn available(&self, role: Role) -> &[String] {
        match role {
            Role::Tagger => &self.tagger_available,
            Role::Angel => &self.angel_available,
        }
    }

    pub fn reset(&mut self) {
        self.tagger_available = self.participants.clone();
        self.angel_available = self.participants.clone();
        debug!("Pick pools reset to {} participants", self.participants.len());
    }

    /// Turning the policy off also refills both pools.
    pub fn set_exclusion(&mut self, exclusion: bool) {
        self.exclusion = exclusion;
        if !exclusion {
            self.reset();
        }
    }

    /// Replaces the participant list, resetting the pools if it changed.
    pub fn set_participants(&mut self, participants: &[String]) {
        let participants = distinct(participants);
        if participants != self.participants {
            self.participants = participants;
            self.reset();
        }
    }

    /// Draws one round. Taggers and angels never overlap, and nothing is
    /// mutated unless both draws succeed.
    pub fn pick_round<R: Rng + ?Sized>(
        &mut self,
        tagger_count: usize,
        angel_count: usize,
        rng: &mut R,
    ) -> Result<PickRound, PickError> {
        if tagger_count == 0 && angel_count == 0 {
            return Err(PickError::ValidationError(
                "At least one tagger or angel must be requested".to_string(),
            ));
        }

        let taggers = select_with_preference(
            tagger_count,
            &self.tagger_available,
            &self.participants,
            rng,
        )
        .map_err(|e| PickError::from_selection(Role::Tagger, e))?;

        let chosen: HashSet<&str> = taggers.selected.iter().map(String::as_str).collect();
        let angel_eligible: Vec<String> = self
            .participants
            .iter()
            .filter(|name| !chosen.contains(name.as_str()))
            .cloned()
            .collect();
        let angels = select_with_preference(angel_count, &self.angel_available, &angel_eligible, rng)
            .map_err(|e| PickError::from_selection(Role::Angel, e))?;

        if self.exclusion {
            consume(&mut self.tagger_available, &taggers, &self.participants);
            consume(&mut self.angel_available, &angels, &self.participants);
        }

        info!(
            "Picked {} tagger(s) and {} angel(s) from {} participants",
            taggers.selected.len(),
            angels.selected.len(),
            self.participants.len()
        );

        Ok(PickRound {
            taggers: taggers.selected,
            angels: angels.selected,
        })
    }
}

/// Removes this round's preferred draws from `available`. An exhausted pool
/// is refilled with everyone except this round's top-up picks, which were
/// already drawn once inside the new window.
fn consume(available: &mut Vec<String>, selection: &Selection, participants: &[String]) {
    let drawn: HashSet<&str> = selection
        .from_preferred
        .iter()
        .map(String::as_str)
        .collect();
    available.retain(|name| !drawn.contains(name.as_str()));

    if available.is_empty() && !selection.selected.is_empty() {
        let topped: HashSet<&str> = selection.topped_up.iter().map(String::as_str).collect();
        *available = participants
            .iter()
            .filter(|name| !topped.contains(name.as_str()))
            .cloned()
            .collect();
        debug!("Pick pool exhausted, refilled with {} names", available.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn participants(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_taggers_and_angels_are_disjoint() {
        let mut pools = PickPools::new(&participants(6), true);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..50 {
            let round = pools.pick_round(2, 2, &mut rng).unwrap();
            assert!(round.angels.iter().all(|a| !round.taggers.contains(a)));
            assert_eq!(round.taggers.len(), 2);
            assert_eq!(round.angels.len(), 2);
        }
    }

    #[test]
    fn test_exclusion_removes_drawn_taggers() {
        let mut pools = PickPools::new(&participants(20), true);
        let mut rng = StdRng::seed_from_u64(1);

        let round = pools.pick_round(2, 1, &mut rng).unwrap();

        let available = pools.available(Role::Tagger);
        assert_eq!(available.len(), 18);
        assert!(round.taggers.iter().all(|t| !available.contains(t)));
        assert_eq!(pools.available(Role::Angel).len(), 19);
    }

    #[test]
    fn test_without_exclusion_pools_stay_full() {
        let mut pools = PickPools::new(&participants(5), false);
        let mut rng = StdRng::seed_from_u64(2);

        pools.pick_round(2, 1, &mut rng).unwrap();

        assert_eq!(pools.available(Role::Tagger).len(), 5);
        assert_eq!(pools.available(Role::Angel).len(), 5);
    }

    #[test]
    fn test_insufficient_angels_leaves_state_untouched() {
        let mut pools = PickPools::new(&participants(4), true);
        let mut rng = StdRng::seed_from_u64(3);
        let before_taggers = pools.available(Role::Tagger).to_vec();

        let result = pools.pick_round(3, 2, &mut rng);

        assert_eq!(
            result,
            Err(PickError::InsufficientParticipants {
                role: Role::Angel,
                required: 2,
                available: 1
            })
        );
        assert_eq!(pools.available(Role::Tagger), before_taggers.as_slice());
        assert_eq!(pools.available(Role::Angel).len(), 4);
    }

    #[test]
    fn test_insufficient_taggers() {
        let mut pools = PickPools::new(&participants(2), true);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            pools.pick_round(3, 0, &mut rng),
            Err(PickError::InsufficientParticipants {
                role: Role::Tagger,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let mut pools = PickPools::new(&participants(2), true);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            pools.pick_round(0, 0, &mut rng),
            Err(PickError::ValidationError(_))
        ));
    }

    #[test]
    fn test_no_repeat_until_everyone_has_been_drawn() {
        let people = participants(10);
        let mut pools = PickPools::new(&people, true);
        let mut rng = StdRng::seed_from_u64(8);
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..5 {
            let round = pools.pick_round(2, 0, &mut rng).unwrap();
            for name in round.taggers {
                *counts.entry(name).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 10);
        assert!(counts.values().all(|&c| c == 1));
        assert_eq!(pools.available(Role::Tagger).len(), 10);
    }

    #[test]
    fn test_uneven_exhaustion_tops_up_instead_of_failing() {
        let mut pools = PickPools::new(&participants(5), true);
        let mut rng = StdRng::seed_from_u64(4);

        pools.pick_round(2, 0, &mut rng).unwrap();
        pools.pick_round(2, 0, &mut rng).unwrap();
        let round = pools.pick_round(2, 0, &mut rng).unwrap();

        assert_eq!(round.taggers.len(), 2);
        let available = pools.available(Role::Tagger);
        assert_eq!(available.len(), 4);
        // The name that had to be re-drawn stays out of the new window.
        let repeated: Vec<&String> = round
            .taggers
            .iter()
            .filter(|t| !available.contains(t))
            .collect();
        assert_eq!(repeated.len(), 1);
    }

    #[test]
    fn test_turning_exclusion_off_resets() {
        let mut pools = PickPools::new(&participants(6), true);
        let mut rng = StdRng::seed_from_u64(6);
        pools.pick_round(3, 1, &mut rng).unwrap();
        assert_eq!(pools.available(Role::Tagger).len(), 3);

        pools.set_exclusion(false);

        assert!(!pools.exclusion());
        assert_eq!(pools.available(Role::Tagger).len(), 6);
        assert_eq!(pools.available(Role::Angel).len(), 6);
    }

    #[test]
    fn test_changing_participants_resets() {
        let mut pools = PickPools::new(&participants(6), true);
        let mut rng = StdRng::seed_from_u64(6);
        pools.pick_round(2, 0, &mut rng).unwrap();

        pools.set_participants(&participants(6));
        assert_eq!(pools.available(Role::Tagger).len(), 4);

        pools.set_participants(&participants(7));
        assert_eq!(pools.available(Role::Tagger).len(), 7);
        assert_eq!(pools.participants().len(), 7);
    }
}
