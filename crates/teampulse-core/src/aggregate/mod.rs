//! Grouping and reduction
//!
//! Pure functions over in-memory records: group by a key, reduce each group
//! with a [`Reducer`], and keep every group's record count alongside the
//! value. Results iterate in canonical [`GroupKey`] order.

pub mod key;
pub mod stats;

use serde::Serialize;
use std::collections::BTreeMap;

pub use key::GroupKey;
pub use stats::{mean, median, round1, Stats};

/// Reduce one group of records to a value
pub trait Reducer<T> {
    type Output;

    fn reduce(&self, records: &[&T]) -> Self::Output;
}

/// A reduced group, with the number of records it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary<O> {
    pub count: usize,
    pub value: O,
}

pub type AggregationResult<O> = BTreeMap<GroupKey, Summary<O>>;

/// Group `records` by `key_fn` and reduce each group
pub fn aggregate<T, K, R>(records: &[T], key_fn: K, reducer: &R) -> AggregationResult<R::Output>
where
    K: Fn(&T) -> GroupKey,
    R: Reducer<T>,
{
    let mut groups: BTreeMap<GroupKey, Vec<&T>> = BTreeMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let summary = Summary {
                count: members.len(),
                value: reducer.reduce(&members),
            };
            (key, summary)
        })
        .collect()
}

/// Reduce every record as a single group
pub fn summarize<T, R: Reducer<T>>(records: &[T], reducer: &R) -> Summary<R::Output> {
    let members: Vec<&T> = records.iter().collect();
    Summary {
        count: members.len(),
        value: reducer.reduce(&members),
    }
}

/// Number of records
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl<T> Reducer<T> for Count {
    type Output = usize;

    fn reduce(&self, records: &[&T]) -> usize {
        records.len()
    }
}

/// The group's records themselves, in input order
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect;

impl<T: Clone> Reducer<T> for Collect {
    type Output = Vec<T>;

    fn reduce(&self, records: &[&T]) -> Vec<T> {
        records.iter().map(|r| (*r).clone()).collect()
    }
}

/// Sum of an extracted value
pub struct Sum<F>(pub F);

impl<T, F: Fn(&T) -> f64> Reducer<T> for Sum<F> {
    type Output = f64;

    fn reduce(&self, records: &[&T]) -> f64 {
        records.iter().map(|r| (self.0)(*r)).sum()
    }
}

/// Mean over the records that have a value; `None` if none do
pub struct Average<F>(pub F);

impl<T, F: Fn(&T) -> Option<f64>> Reducer<T> for Average<F> {
    type Output = Option<f64>;

    fn reduce(&self, records: &[&T]) -> Option<f64> {
        let values: Vec<f64> = records.iter().filter_map(|r| (self.0)(*r)).collect();
        mean(&values)
    }
}

/// Weighted share of the records matching a predicate, as a percentage.
///
/// `round(sum(weight | predicate) / sum(weight) * 100, 1)`, 0 when the total
/// weight is 0.
pub struct WeightedShare<W, P> {
    pub weight: W,
    pub predicate: P,
}

impl<W, P> WeightedShare<W, P> {
    pub fn new(weight: W, predicate: P) -> Self {
        Self { weight, predicate }
    }
}

impl<T, W, P> Reducer<T> for WeightedShare<W, P>
where
    W: Fn(&T) -> f64,
    P: Fn(&T) -> bool,
{
    type Output = ShareSummary;

    fn reduce(&self, records: &[&T]) -> ShareSummary {
        let mut matched = 0.0;
        let mut total = 0.0;
        for &record in records {
            let w = (self.weight)(record);
            total += w;
            if (self.predicate)(record) {
                matched += w;
            }
        }
        ShareSummary {
            matched: round1(matched),
            total: round1(total),
            percentage: percentage(matched, total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShareSummary {
    pub matched: f64,
    pub total: f64,
    pub percentage: f64,
}

/// `round(part / whole * 100, 1)`, 0 when `whole` is 0
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round1(part / whole * 100.0)
    }
}

/// Record count per key, in canonical key order
pub fn count_by<T, K>(records: &[T], key_fn: K) -> Vec<(GroupKey, usize)>
where
    K: Fn(&T) -> GroupKey,
{
    aggregate(records, key_fn, &Count)
        .into_iter()
        .map(|(key, summary)| (key, summary.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        team: &'static str,
        quarter: &'static str,
        weight: f64,
        tech: bool,
    }

    fn item(team: &'static str, quarter: &'static str, weight: f64, tech: bool) -> Item {
        Item {
            team,
            quarter,
            weight,
            tech,
        }
    }

    #[test]
    fn test_weighted_share() {
        let records = vec![
            item("a", "2024 Q1", 10.0, true),
            item("a", "2024 Q1", 10.0, false),
            item("a", "2024 Q1", 5.0, true),
        ];
        let share = summarize(&records, &WeightedShare::new(|r: &Item| r.weight, |r: &Item| r.tech));
        assert_eq!(share.count, 3);
        assert_eq!(share.value.percentage, 60.0);
        assert_eq!(share.value.matched, 15.0);
        assert_eq!(share.value.total, 25.0);
    }

    #[test]
    fn test_weighted_share_zero_total() {
        let records = vec![item("a", "2024 Q1", 0.0, true)];
        let share = summarize(&records, &WeightedShare::new(|r: &Item| r.weight, |r: &Item| r.tech));
        assert_eq!(share.value.percentage, 0.0);
    }

    #[test]
    fn test_group_by_quarter_sum_and_count() {
        let records = vec![
            item("b", "2024 Q3", 1.5, false),
            item("a", "2024 Q1", 2.0, false),
            item("a", "2024 Q3", 3.0, false),
        ];
        let result = aggregate(&records, |r| GroupKey::period(r.quarter), &Sum(|r: &Item| r.weight));

        let entries: Vec<(String, usize, f64)> = result
            .iter()
            .map(|(k, s)| (k.label(), s.count, s.value))
            .collect();
        assert_eq!(
            entries,
            vec![("2024 Q1".to_string(), 1, 2.0), ("2024 Q3".to_string(), 2, 4.5)]
        );
    }

    #[test]
    fn test_average_skips_missing() {
        let records = vec![item("a", "q", 4.0, true), item("a", "q", 0.0, false), item("a", "q", 8.0, true)];
        let avg = summarize(
            &records,
            &Average(|r: &Item| if r.tech { Some(r.weight) } else { None }),
        );
        assert_eq!(avg.value, Some(6.0));
        assert_eq!(avg.count, 3);
    }

    #[test]
    fn test_collect_keeps_input_order() {
        #[derive(Clone, Debug, PartialEq)]
        struct Row(&'static str, u32);
        let rows = vec![Row("x", 1), Row("y", 2), Row("x", 3)];
        let grouped = aggregate(&rows, |r| GroupKey::name(r.0), &Collect);
        assert_eq!(grouped[&GroupKey::name("x")].value, vec![Row("x", 1), Row("x", 3)]);
        assert_eq!(grouped[&GroupKey::name("y")].count, 1);
    }

    #[test]
    fn test_count_by_canonical_order() {
        let records = vec![item("beta", "", 0.0, false), item("Alpha", "", 0.0, false), item("beta", "", 0.0, false)];
        let counts = count_by(&records, |r| GroupKey::name(r.team));
        assert_eq!(
            counts,
            vec![(GroupKey::name("Alpha"), 1), (GroupKey::name("beta"), 2)]
        );
    }
}
