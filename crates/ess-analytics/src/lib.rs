use chrono::NaiveDate;
use ess_core::{CategoricalField, NumericField, SessionRow};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub mod export;
pub mod snapshot;

pub use export::{csv_string, write_csv, ExportError, CSV_HEADERS};
pub use snapshot::DashboardSnapshot;

/// Conjunction of the three user-driven predicates. An empty allowed-set is an
/// empty result, not an implicit match-all, and an inverted date range simply
/// matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub devices: BTreeSet<String>,
    pub session_types: BTreeSet<String>,
}

impl SessionFilter {
    /// The filter the dashboard starts with: the table's full date span and
    /// every observed device and session type allowed.
    pub fn permissive(rows: &[SessionRow]) -> Self {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let start_date = rows.iter().map(SessionRow::start_date).min().unwrap_or(epoch);
        let end_date = rows.iter().map(SessionRow::start_date).max().unwrap_or(epoch);
        Self {
            start_date,
            end_date,
            devices: distinct_values(rows, CategoricalField::Device),
            session_types: distinct_values(rows, CategoricalField::SessionType),
        }
    }

    pub fn matches(&self, row: &SessionRow) -> bool {
        let date = row.start_date();
        date >= self.start_date
            && date <= self.end_date
            && self.devices.contains(&row.device)
            && self.session_types.contains(&row.session_type)
    }

    /// Derived view: the subsequence of rows satisfying every predicate, in
    /// input order. The source table is never mutated.
    pub fn apply(&self, rows: &[SessionRow]) -> Vec<SessionRow> {
        rows.iter().filter(|row| self.matches(row)).cloned().collect()
    }
}

/// Sorted distinct values of a categorical column, for filter option lists.
pub fn distinct_values(rows: &[SessionRow], field: CategoricalField) -> BTreeSet<String> {
    rows.iter()
        .map(|row| row.categorical(field).to_string())
        .collect()
}

pub fn count(rows: &[SessionRow]) -> u64 {
    rows.len() as u64
}

pub fn sum(rows: &[SessionRow], field: NumericField) -> f64 {
    rows.iter().map(|row| row.numeric(field)).sum()
}

/// Undefined over an empty table; callers render a sentinel instead of
/// dividing by zero.
pub fn mean(rows: &[SessionRow], field: NumericField) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    Some(sum(rows, field) / rows.len() as f64)
}

/// Percentage of rows whose categorical field equals `value`. Same
/// empty-table guard as [`mean`].
pub fn rate(rows: &[SessionRow], field: CategoricalField, value: &str) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let hits = rows.iter().filter(|row| row.categorical(field) == value).count();
    Some(hits as f64 / rows.len() as f64 * 100.0)
}

/// Sum of `measure` per distinct value of `group`, sorted descending by sum.
/// Ties keep first-appearance order.
pub fn group_sum(
    rows: &[SessionRow],
    group: CategoricalField,
    measure: NumericField,
) -> Vec<(String, f64)> {
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key = row.categorical(group);
        match index.get(key) {
            Some(&slot) => order[slot].1 += row.numeric(measure),
            None => {
                index.insert(key.to_string(), order.len());
                order.push((key.to_string(), row.numeric(measure)));
            }
        }
    }
    order.sort_by(|left, right| right.1.total_cmp(&left.1));
    order
}

/// Row count per distinct value, sorted descending, stable ties.
pub fn value_counts(rows: &[SessionRow], field: CategoricalField) -> Vec<(String, u64)> {
    let mut order: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key = row.categorical(field);
        match index.get(key) {
            Some(&slot) => order[slot].1 += 1,
            None => {
                index.insert(key.to_string(), order.len());
                order.push((key.to_string(), 1));
            }
        }
    }
    order.sort_by(|left, right| right.1.cmp(&left.1));
    order
}

/// Sessions per calendar date of `start_time`, ascending. Dates with zero
/// sessions are absent rather than zero-filled.
pub fn time_series_count(rows: &[SessionRow]) -> Vec<(NaiveDate, u64)> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.start_date()).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use ess_core::UNKNOWN;

    fn stamp(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn row(id: &str, day: u32, device: &str, session_type: &str, sales: f64) -> SessionRow {
        SessionRow {
            id: id.to_string(),
            start_time: stamp(day),
            last_activity: stamp(day),
            device: device.to_string(),
            browser: UNKNOWN.to_string(),
            source: UNKNOWN.to_string(),
            sales,
            page_views: 4,
            duration: 120.0,
            session_type: session_type.to_string(),
            segment: UNKNOWN.to_string(),
            category: UNKNOWN.to_string(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    fn scenario_rows() -> Vec<SessionRow> {
        vec![
            row("a", 1, "mobile", "converted", 50.0),
            row("b", 2, "desktop", "bounced", 0.0),
            row("c", 3, "mobile", "converted", 30.0),
        ]
    }

    fn scenario_filter() -> SessionFilter {
        SessionFilter {
            start_date: date(1),
            end_date: date(31),
            devices: BTreeSet::from(["mobile".to_string()]),
            session_types: BTreeSet::from(["converted".to_string()]),
        }
    }

    #[test]
    fn filter_scenario_matches_the_documented_numbers() {
        let rows = scenario_rows();
        let view = scenario_filter().apply(&rows);
        assert_eq!(count(&view), 2);
        assert_eq!(sum(&view, NumericField::Sales), 80.0);
        assert_eq!(
            rate(&view, CategoricalField::SessionType, "converted"),
            Some(100.0)
        );
    }

    #[test]
    fn filter_is_idempotent() {
        let rows = scenario_rows();
        let filter = scenario_filter();
        let once = filter.apply(&rows);
        let twice = filter.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_allowed_set_yields_empty_view() {
        let rows = scenario_rows();
        let mut filter = SessionFilter::permissive(&rows);
        filter.devices.clear();
        assert!(filter.apply(&rows).is_empty());
    }

    #[test]
    fn inverted_date_range_yields_empty_view() {
        let rows = scenario_rows();
        let mut filter = SessionFilter::permissive(&rows);
        filter.start_date = date(20);
        filter.end_date = date(10);
        assert!(filter.apply(&rows).is_empty());
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let rows = scenario_rows();
        let mut filter = SessionFilter::permissive(&rows);
        filter.start_date = date(1);
        filter.end_date = date(2);
        let view = filter.apply(&rows);
        let ids: Vec<&str> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn permissive_filter_keeps_everything() {
        let rows = scenario_rows();
        let filter = SessionFilter::permissive(&rows);
        assert_eq!(filter.apply(&rows).len(), rows.len());
        assert_eq!(filter.start_date, date(1));
        assert_eq!(filter.end_date, date(3));
    }

    #[test]
    fn empty_table_aggregates_report_sentinels() {
        let empty: Vec<SessionRow> = Vec::new();
        assert_eq!(count(&empty), 0);
        assert_eq!(sum(&empty, NumericField::Sales), 0.0);
        assert_eq!(mean(&empty, NumericField::Sales), None);
        assert_eq!(rate(&empty, CategoricalField::SessionType, "converted"), None);
        assert!(group_sum(&empty, CategoricalField::Source, NumericField::Sales).is_empty());
        assert!(time_series_count(&empty).is_empty());
    }

    #[test]
    fn group_sum_sorts_descending_with_stable_ties() {
        let rows = vec![
            row("a", 1, "mobile", "converted", 10.0),
            row("b", 1, "tablet", "converted", 25.0),
            row("c", 1, "desktop", "converted", 10.0),
            row("d", 1, "mobile", "converted", 0.0),
        ];
        let grouped = group_sum(&rows, CategoricalField::Device, NumericField::Sales);
        let labels: Vec<&str> = grouped.iter().map(|(label, _)| label.as_str()).collect();
        // mobile and desktop both sum to 10; mobile appeared first.
        assert_eq!(labels, vec!["tablet", "mobile", "desktop"]);
        assert_eq!(grouped[0].1, 25.0);
    }

    #[test]
    fn value_counts_sorts_descending_with_stable_ties() {
        let rows = vec![
            row("a", 1, "desktop", "converted", 0.0),
            row("b", 1, "mobile", "bounced", 0.0),
            row("c", 1, "mobile", "converted", 0.0),
            row("d", 1, "tablet", "bounced", 0.0),
        ];
        let counts = value_counts(&rows, CategoricalField::Device);
        let labels: Vec<&str> = counts.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["mobile", "desktop", "tablet"]);
        assert_eq!(counts[0].1, 2);
    }

    #[test]
    fn time_series_is_chronological_without_gap_filling() {
        let rows = vec![
            row("a", 9, "mobile", "converted", 0.0),
            row("b", 2, "mobile", "converted", 0.0),
            row("c", 9, "mobile", "converted", 0.0),
        ];
        let series = time_series_count(&rows);
        assert_eq!(series, vec![(date(2), 1), (date(9), 2)]);
    }

    #[test]
    fn mean_over_rows_divides_by_row_count() {
        let rows = scenario_rows();
        let average = mean(&rows, NumericField::Sales).expect("non-empty");
        assert!((average - 80.0 / 3.0).abs() < 1e-9);
    }
}
