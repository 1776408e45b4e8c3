use std::collections::HashSet;

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::group::{group_name, Group, GroupAssignment, GroupMember};
use crate::services::errors::grouping_errors::GroupingError;
use crate::services::selector::distinct;

/// Inputs for `assign`. `fixed` only takes effect when `saved_structure`
/// holds at least one non-empty group.
#[derive(Debug, Clone, Default)]
pub struct AssignmentRequest<'a> {
    pub roster: &'a [String],
    pub group_count: usize,
    pub group_names: &'a [String],
    pub fixed: bool,
    pub saved_structure: &'a [Vec<String>],
    pub mark_leader: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentMode {
    Random,
    Fixed,
}

pub fn resolve_mode(fixed: bool, saved_structure: &[Vec<String>]) -> AssignmentMode {
    if fixed && saved_structure.iter().any(|group| !group.is_empty()) {
        AssignmentMode::Fixed
    } else {
        AssignmentMode::Random
    }
}

pub fn assign<R: Rng + ?Sized>(
    request: &AssignmentRequest<'_>,
    rng: &mut R,
) -> Result<GroupAssignment, GroupingError> {
    let mode = resolve_mode(request.fixed, request.saved_structure);
    if request.fixed && mode == AssignmentMode::Random {
        debug!("Fixed grouping requested without a saved structure, shuffling instead");
    }
    match mode {
        AssignmentMode::Fixed => Ok(assign_fixed(
            request.saved_structure,
            request.roster,
            request.group_names,
            request.mark_leader,
        )),
        AssignmentMode::Random => {
            let mut assignment =
                assign_random(request.roster, request.group_count, request.group_names, rng)?;
            if request.mark_leader {
                mark_leaders(&mut assignment.groups);
            }
            Ok(assignment)
        }
    }
}

/// Shuffles the roster into `group_count` equal slices, then hands each
/// leftover student to a different randomly chosen group.
pub fn assign_random<R: Rng + ?Sized>(
    roster: &[String],
    group_count: usize,
    group_names: &[String],
    rng: &mut R,
) -> Result<GroupAssignment, GroupingError> {
    if group_count == 0 {
        return Err(GroupingError::ValidationError(
            "Group count must be at least 1".to_string(),
        ));
    }

    let mut shuffled = distinct(roster);
    shuffled.shuffle(rng);
    let group_size = shuffled.len() / group_count;

    let mut groups: Vec<Group> = (0..group_count)
        .map(|i| {
            let ordinal = (i + 1) as u32;
            let mut group = Group::new(ordinal, group_name(group_names, ordinal));
            group.members = shuffled[i * group_size..(i + 1) * group_size]
                .iter()
                .map(|name| GroupMember::new(name))
                .collect();
            group
        })
        .collect();

    let leftovers = &shuffled[group_count * group_size..];
    let targets = index::sample(rng, group_count, leftovers.len());
    for (name, target) in leftovers.iter().zip(targets.iter()) {
        groups[target].members.push(GroupMember::new(name));
    }

    Ok(GroupAssignment {
        groups,
        unassigned: Vec::new(),
    })
}

/// Prunes a saved structure to the active roster. Order inside each group is
/// kept, nobody is moved, and active names missing from the structure end up
/// in `unassigned`.
pub fn assign_fixed(
    saved_structure: &[Vec<String>],
    active: &[String],
    group_names: &[String],
    mark_leader: bool,
) -> GroupAssignment {
    let active_set: HashSet<&str> = active.iter().map(String::as_str).collect();
    let mut placed: HashSet<&str> = HashSet::new();

    let mut groups: Vec<Group> = saved_structure
        .iter()
        .enumerate()
        .map(|(i, saved)| {
            let ordinal = (i + 1) as u32;
            let mut group = Group::new(ordinal, group_name(group_names, ordinal));
            for name in saved {
                if active_set.contains(name.as_str()) && placed.insert(name.as_str()) {
                    group.members.push(GroupMember::new(name));
                }
            }
            group
        })
        .collect();

    if mark_leader {
        mark_leaders(&mut groups);
    }

    let unassigned = distinct(active)
        .into_iter()
        .filter(|name| !placed.contains(name.as_str()))
        .collect();

    GroupAssignment { groups, unassigned }
}

fn mark_leaders(groups: &mut [Group]) {
    for group in groups.iter_mut() {
        for (i, member) in group.members.iter_mut().enumerate() {
            member.is_leader = i == 0;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total: usize,
    pub mean: f64,
    pub min: usize,
    pub max: usize,
    pub balanced: bool,
}

impl GroupStats {
    pub fn from_groups(groups: &[Group]) -> Self {
        let sizes: Vec<usize> = groups.iter().map(Group::len).collect();
        let total: usize = sizes.iter().sum();
        let min = sizes.iter().copied().min().unwrap_or(0);
        let max = sizes.iter().copied().max().unwrap_or(0);
        let mean = if sizes.is_empty() {
            0.0
        } else {
            total as f64 / sizes.len() as f64
        };
        GroupStats {
            total,
            mean,
            min,
            max,
            balanced: max - min <= 1,
        }
    }
}
