use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::services::errors::selector_errors::SelectionError;

/// Outcome of a preferred-pool draw.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub selected: Vec<String>,
    /// Names that came out of the preferred pool. Callers remove these from
    /// their exclusion pools.
    pub from_preferred: Vec<String>,
    /// Names drawn from the full list because the preferred pool ran short.
    pub topped_up: Vec<String>,
}

/// Draws `count` distinct names, taking from `preferred` first and topping up
/// uniformly from the rest of `full` only when `preferred` is too small.
///
/// `preferred` entries that are not in `full` are ignored and duplicates are
/// collapsed in both lists. Fails without side effects when `full` has fewer
/// than `count` distinct names.
pub fn select_with_preference<R: Rng + ?Sized>(
    count: usize,
    preferred: &[String],
    full: &[String],
    rng: &mut R,
) -> Result<Selection, SelectionError> {
    let eligible = distinct(full);
    if eligible.len() < count {
        return Err(SelectionError::InsufficientParticipants {
            required: count,
            available: eligible.len(),
        });
    }

    let eligible_set: HashSet<&str> = eligible.iter().map(String::as_str).collect();
    let mut pool: Vec<String> = distinct(preferred)
        .into_iter()
        .filter(|name| eligible_set.contains(name.as_str()))
        .collect();
    pool.shuffle(rng);
    pool.truncate(count);
    let from_preferred = pool;

    let mut topped_up = Vec::new();
    if from_preferred.len() < count {
        let taken: HashSet<&str> = from_preferred.iter().map(String::as_str).collect();
        let mut rest: Vec<String> = eligible
            .iter()
            .filter(|name| !taken.contains(name.as_str()))
            .cloned()
            .collect();
        rest.shuffle(rng);
        rest.truncate(count - from_preferred.len());
        topped_up = rest;
    }

    let mut selected = from_preferred.clone();
    selected.extend(topped_up.iter().cloned());

    Ok(Selection {
        selected,
        from_preferred,
        topped_up,
    })
}

/// `select_with_preference` on the thread-local RNG.
pub fn select(
    count: usize,
    preferred: &[String],
    full: &[String],
) -> Result<Selection, SelectionError> {
    select_with_preference(count, preferred, full, &mut rand::thread_rng())
}

pub(crate) fn distinct(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}
