//! Grouping and counting for chart series.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::{month_key, MonthKey};
use crate::filter::Filterable;
use crate::status::{classify_status_with, StatusCategory, Trackable};
use crate::units::UnitKey;
use crate::{DashboardConfig, DeadlineControlRecord, InspectionRecord};

/// Chart-ready `(key, count)` pair.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupCount<K> {
    pub key: K,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupSum<K> {
    pub key: K,
    pub count: usize,
    pub total: f64,
}

/// Counts records per key, returned in the key's natural order.
///
/// The result does not depend on the order of `records`, and the counts add
/// up to `records.len()`.
pub fn aggregate_by<T, K, F>(records: &[T], mut key_fn: F) -> Vec<GroupCount<K>>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut groups: BTreeMap<K, usize> = BTreeMap::new();
    for record in records {
        *groups.entry(key_fn(record)).or_insert(0) += 1;
    }
    groups
        .into_iter()
        .map(|(key, count)| GroupCount { key, count })
        .collect()
}

/// Counts and sums `value_fn` per key, in the key's natural order.
pub fn sum_by<T, K, F, V>(records: &[T], mut key_fn: F, mut value_fn: V) -> Vec<GroupSum<K>>
where
    K: Ord,
    F: FnMut(&T) -> K,
    V: FnMut(&T) -> f64,
{
    let mut groups: BTreeMap<K, (usize, f64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(key_fn(record)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += value_fn(record);
    }
    groups
        .into_iter()
        .map(|(key, (count, total))| GroupSum { key, count, total })
        .collect()
}

/// The `n` most frequent keys, by descending count. Equal counts keep the
/// order in which their keys first appeared.
pub fn top_n<T, K, F>(records: &[T], mut key_fn: F, n: usize) -> Vec<GroupCount<K>>
where
    K: Eq + Hash + Clone,
    F: FnMut(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<GroupCount<K>> = Vec::new();

    for record in records {
        match positions.entry(key_fn(record)) {
            Entry::Occupied(slot) => groups[*slot.get()].count += 1,
            Entry::Vacant(slot) => {
                groups.push(GroupCount {
                    key: slot.key().clone(),
                    count: 1,
                });
                slot.insert(groups.len() - 1);
            }
        }
    }

    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups.truncate(n);
    groups
}

/// Key selector grouping by trimmed unit name.
pub fn by_unit<T: Filterable>(record: &T) -> UnitKey {
    UnitKey(record.unit().trim().to_string())
}

/// Departments share the unit ordering so numbered codes list numerically.
pub fn by_department<T: Filterable>(record: &T) -> UnitKey {
    UnitKey(record.department().unwrap_or_default().trim().to_string())
}

/// Key selector grouping by trimmed non-conformity text.
pub fn by_non_conformity<T: Filterable>(record: &T) -> String {
    record.non_conformity().trim().to_string()
}

/// Key selector grouping by criticality; records without one share `""`.
pub fn by_criticality<T: Filterable>(record: &T) -> String {
    record.criticality().unwrap_or_default().trim().to_string()
}

/// Undated inspections group under `None`, ahead of every month.
pub fn by_inspection_month(record: &InspectionRecord) -> Option<MonthKey> {
    record.inspected_on.map(month_key)
}

/// Undated deadline controls group under `None`.
pub fn by_deadline_month(record: &DeadlineControlRecord) -> Option<MonthKey> {
    record.deadline.map(month_key)
}

/// Key selector grouping by derived status as of `today`.
pub fn by_status<T: Trackable>(
    today: NaiveDate,
    config: &DashboardConfig,
) -> impl Fn(&T) -> StatusCategory {
    let config = config.clone();
    move |record| classify_status_with(record, today, &config)
}
