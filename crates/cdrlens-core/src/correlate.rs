use crate::model::{Call, LegRecord, LegType};
use crate::parsing::values::parse_instant;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey<'a> {
    Correlated(&'a str),
    /// Legs with an empty correlation id never merge with each other.
    Uncorrelated(&'a str, usize),
}

/// Reconstruct logical calls from a set of legs.
///
/// Legs are grouped by correlation id and ordered by start time inside each
/// group. The result does not depend on input order: calls are returned in
/// ascending order of their first leg's start time, then correlation id.
pub fn reconstruct(legs: &[LegRecord]) -> Vec<Call> {
    let mut groups: BTreeMap<GroupKey<'_>, Vec<&LegRecord>> = BTreeMap::new();
    for (idx, leg) in legs.iter().enumerate() {
        let key = if leg.correlation_id.trim().is_empty() {
            GroupKey::Uncorrelated(&leg.natural_key, idx)
        } else {
            GroupKey::Correlated(&leg.correlation_id)
        };
        groups.entry(key).or_default().push(leg);
    }

    let mut calls: Vec<(LegSortKey<'_>, Call)> = groups
        .into_values()
        .map(|mut group| {
            group.sort_by(|a, b| compare_legs(a, b));
            (LegSortKey::of(group[0]), reduce_group(&group))
        })
        .collect();

    calls.sort_by(|(ka, ca), (kb, cb)| {
        ka.cmp(kb)
            .then_with(|| ca.correlation_id.cmp(&cb.correlation_id))
    });
    calls.into_iter().map(|(_, call)| call).collect()
}

/// Reduce one group of legs, already sorted by start time, into a call.
fn reduce_group(legs: &[&LegRecord]) -> Call {
    let first = legs[0];
    let last = legs[legs.len() - 1];

    let total_duration = legs
        .iter()
        .fold(0u64, |acc, l| acc.saturating_add(l.duration));

    // Earliest-starting answered leg decides the outcome; otherwise the
    // temporally last leg does.
    let answered = legs.iter().find(|l| l.answered());
    let outcome = answered.unwrap_or(&last).outcome.clone();

    let end_time = legs
        .iter()
        .map(|l| l.finished_at())
        .max_by(|a, b| compare_timestamps(a, b))
        .unwrap_or(first.start_time.as_str())
        .to_string();

    let leg_type = legs
        .iter()
        .map(|l| l.leg_type)
        .max_by_key(|t| t.precedence())
        .unwrap_or_default();

    Call {
        correlation_id: first.correlation_id.clone(),
        start_time: first.start_time.clone(),
        end_time,
        total_duration,
        location: first.location.clone(),
        department: first.department.clone(),
        leg_count: legs.len(),
        was_answered: answered.is_some(),
        outcome,
        leg_type,
        transfer_count: count_type(legs, LegType::Transfer),
        hold_count: count_type(legs, LegType::Hold),
    }
}

fn count_type(legs: &[&LegRecord], leg_type: LegType) -> usize {
    legs.iter().filter(|l| l.leg_type == leg_type).count()
}

/// Total order over legs: parsed start instant (unparseable last), then the
/// raw strings, then identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct LegSortKey<'a> {
    unparsed: bool,
    instant: Option<DateTime<Utc>>,
    start: &'a str,
    leg_id: &'a str,
    natural_key: &'a str,
}

impl<'a> LegSortKey<'a> {
    fn of(leg: &'a LegRecord) -> Self {
        let instant = parse_instant(&leg.start_time);
        LegSortKey {
            unparsed: instant.is_none(),
            instant,
            start: &leg.start_time,
            leg_id: &leg.leg_id,
            natural_key: &leg.natural_key,
        }
    }
}

fn compare_legs(a: &LegRecord, b: &LegRecord) -> Ordering {
    LegSortKey::of(a).cmp(&LegSortKey::of(b))
}

/// Compare two timestamps as instants when both parse, else as strings.
fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_instant(a), parse_instant(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
