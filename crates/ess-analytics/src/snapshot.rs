//! Assembles the full presentation payload for one render pass: eight scalar
//! metrics and six chart specs, all in chart-library-agnostic shapes.

use crate::{count, group_sum, mean, rate, sum, time_series_count, value_counts};
use ess_core::charts::{ChartSpec, Metric, SeriesPoint};
use ess_core::{CategoricalField, NumericField, SessionRow};
use serde::{Deserialize, Serialize};

pub const SESSION_TYPE_CONVERTED: &str = "converted";
pub const SESSION_TYPE_CART_ABANDONED: &str = "cart_abandoned";
pub const SESSION_TYPE_BOUNCED: &str = "bounced";

/// Everything a front end needs to draw one dashboard frame. Rebuilt from the
/// filtered view on every interaction; no state is carried between renders.
///
/// The three rate metrics treat `session_type` categories as mutually
/// exclusive but not exhaustive, so they are independent percentages and need
/// not sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub metrics: Vec<Metric>,
    pub charts: Vec<ChartSpec>,
}

const PRIMARY_METRICS: usize = 5;

impl DashboardSnapshot {
    pub fn build(rows: &[SessionRow]) -> Self {
        let avg_duration_min = mean(rows, NumericField::Duration).map(|seconds| seconds / 60.0);

        let metrics = vec![
            Metric::count("Total Sessions", count(rows)),
            Metric::currency("Total Sales", Some(sum(rows, NumericField::Sales))),
            Metric::decimal("Avg Duration", avg_duration_min, " min"),
            Metric::percent(
                "Conversion Rate",
                rate(rows, CategoricalField::SessionType, SESSION_TYPE_CONVERTED),
            ),
            Metric::decimal("Avg Page Views", mean(rows, NumericField::PageViews), ""),
            Metric::percent(
                "Cart Abandonment Rate",
                rate(rows, CategoricalField::SessionType, SESSION_TYPE_CART_ABANDONED),
            ),
            Metric::currency("Avg Sales/Session", mean(rows, NumericField::Sales)),
            Metric::percent(
                "Bounce Rate",
                rate(rows, CategoricalField::SessionType, SESSION_TYPE_BOUNCED),
            ),
        ];

        let charts = vec![
            ChartSpec::pie(
                "Device Distribution",
                count_series(value_counts(rows, CategoricalField::Device)),
            ),
            ChartSpec::bar(
                "Session Types",
                count_series(value_counts(rows, CategoricalField::SessionType)),
            ),
            ChartSpec::bar(
                "Sales by Source",
                sum_series(group_sum(rows, CategoricalField::Source, NumericField::Sales)),
            ),
            ChartSpec::pie(
                "Customer Segments",
                count_series(value_counts(rows, CategoricalField::Segment)),
            ),
            ChartSpec::line(
                "Daily Sessions",
                time_series_count(rows)
                    .into_iter()
                    .map(|(date, sessions)| SeriesPoint::new(date.to_string(), sessions as f64))
                    .collect(),
            ),
            ChartSpec::bar(
                "Top Categories by Sales",
                sum_series(group_sum(rows, CategoricalField::Category, NumericField::Sales)),
            ),
        ];

        Self { metrics, charts }
    }

    /// The headline row of tiles.
    pub fn primary_metrics(&self) -> &[Metric] {
        &self.metrics[..PRIMARY_METRICS.min(self.metrics.len())]
    }

    /// The advanced-analytics tiles.
    pub fn advanced_metrics(&self) -> &[Metric] {
        &self.metrics[PRIMARY_METRICS.min(self.metrics.len())..]
    }
}

fn count_series(counts: Vec<(String, u64)>) -> Vec<SeriesPoint> {
    counts
        .into_iter()
        .map(|(label, sessions)| SeriesPoint::new(label, sessions as f64))
        .collect()
}

fn sum_series(sums: Vec<(String, f64)>) -> Vec<SeriesPoint> {
    sums.into_iter()
        .map(|(label, total)| SeriesPoint::new(label, total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use ess_core::charts::{ChartKind, NO_DATA};
    use ess_core::UNKNOWN;

    fn stamp(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn row(day: u32, device: &str, session_type: &str, sales: f64, duration: f64) -> SessionRow {
        SessionRow {
            id: format!("{device}-{day}"),
            start_time: stamp(day),
            last_activity: stamp(day),
            device: device.to_string(),
            browser: UNKNOWN.to_string(),
            source: "organic".to_string(),
            sales,
            page_views: 5,
            duration,
            session_type: session_type.to_string(),
            segment: "new".to_string(),
            category: "apparel".to_string(),
        }
    }

    #[test]
    fn snapshot_metrics_match_the_filtered_scenario() {
        let rows = vec![
            row(1, "mobile", SESSION_TYPE_CONVERTED, 50.0, 120.0),
            row(3, "mobile", SESSION_TYPE_CONVERTED, 30.0, 240.0),
        ];
        let snapshot = DashboardSnapshot::build(&rows);

        assert_eq!(snapshot.metrics[0].formatted, "2");
        assert_eq!(snapshot.metrics[1].formatted, "$80.00");
        assert_eq!(snapshot.metrics[2].formatted, "3.0 min");
        assert_eq!(snapshot.metrics[3].formatted, "100.0%");
        assert_eq!(snapshot.metrics[4].formatted, "5.0");
        assert_eq!(snapshot.primary_metrics().len(), 5);
        assert_eq!(snapshot.advanced_metrics().len(), 3);
    }

    #[test]
    fn empty_view_renders_sentinels_not_faults() {
        let snapshot = DashboardSnapshot::build(&[]);
        assert_eq!(snapshot.metrics[0].formatted, "0");
        assert_eq!(snapshot.metrics[1].formatted, "$0.00");
        assert_eq!(snapshot.metrics[2].formatted, NO_DATA);
        assert_eq!(snapshot.metrics[3].formatted, NO_DATA);
        assert!(snapshot.charts.iter().all(ChartSpec::is_empty));
    }

    #[test]
    fn snapshot_charts_have_the_documented_shapes() {
        let rows = vec![
            row(1, "mobile", SESSION_TYPE_CONVERTED, 50.0, 120.0),
            row(2, "desktop", SESSION_TYPE_BOUNCED, 0.0, 30.0),
            row(2, "mobile", SESSION_TYPE_CART_ABANDONED, 0.0, 60.0),
        ];
        let snapshot = DashboardSnapshot::build(&rows);
        assert_eq!(snapshot.charts.len(), 6);

        let kinds: Vec<ChartKind> = snapshot.charts.iter().map(|chart| chart.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChartKind::Pie,
                ChartKind::Bar,
                ChartKind::Bar,
                ChartKind::Pie,
                ChartKind::Line,
                ChartKind::Bar,
            ]
        );

        let devices = &snapshot.charts[0];
        assert_eq!(devices.series[0].label, "mobile");
        assert_eq!(devices.series[0].value, 2.0);

        let daily = &snapshot.charts[4];
        assert_eq!(daily.series[0].label, "2026-03-01");
        assert_eq!(daily.series[1].label, "2026-03-02");
        assert_eq!(daily.series[1].value, 2.0);
    }

    #[test]
    fn rates_are_independent_percentages() {
        let rows = vec![
            row(1, "mobile", SESSION_TYPE_CONVERTED, 50.0, 120.0),
            row(1, "mobile", "browsing", 0.0, 60.0),
        ];
        let snapshot = DashboardSnapshot::build(&rows);
        assert_eq!(snapshot.metrics[3].formatted, "50.0%");
        assert_eq!(snapshot.metrics[5].formatted, "0.0%");
        assert_eq!(snapshot.metrics[7].formatted, "0.0%");
    }
}
