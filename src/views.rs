//! Plot- and table-ready view models derived from aggregated stats.
//!
//! Everything here is a pure function of (aggregated stats, groups); the
//! caller hands the result to whatever renders charts or grids.

use std::cmp::Ordering;
use std::fmt::Write as _;

use serde::Serialize;

use crate::metrics::{self, paired_title, Better, MetricSpec, METRICS, METRIC_PAIRS, TABLE_COLUMNS};
use crate::natsort::natural_sort;
use crate::selection::{FieldFilter, Group, SelectionIndex};
use crate::stats::AggStats;

pub const CHART_WIDTH: u32 = 500;
pub const MARKER_SIZE: u32 = 10;
pub const MARKER_ALPHA: f64 = 0.5;
pub const RANKED_X_TITLE: &str = "Sorted params";

/// Plotly's default qualitative palette.
pub const PALETTE: [(u8, u8, u8); 10] = [
    (31, 119, 180),
    (255, 127, 14),
    (44, 160, 44),
    (214, 39, 40),
    (148, 103, 189),
    (140, 86, 75),
    (227, 119, 194),
    (127, 127, 127),
    (188, 189, 34),
    (23, 190, 207),
];

pub fn group_color(idx: usize, alpha: f64) -> String {
    let (r, g, b) = PALETTE[idx % PALETTE.len()];
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}

/// One legend entry: a marker series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub mode: &'static str,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub text: Vec<String>,
    pub color: String,
    pub marker_size: u32,
}

impl Trace {
    fn new(idx: usize, label: &str) -> Self {
        Self {
            name: label.to_string(),
            mode: "markers",
            x: Vec::new(),
            y: Vec::new(),
            text: Vec::new(),
            color: group_color(idx, MARKER_ALPHA),
            marker_size: MARKER_SIZE,
        }
    }

    fn push(&mut self, x: f64, y: f64, key: &str) {
        self.x.push(x);
        self.y.push(y);
        self.text.push(key.to_string());
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub width: u32,
    pub hovermode: &'static str,
    pub show_legend: bool,
}

impl Layout {
    fn new(title: String, x_title: &str, y_title: &str) -> Self {
        Self {
            title,
            x_title: x_title.to_string(),
            y_title: y_title.to_string(),
            width: CHART_WIDTH,
            hovermode: "closest",
            show_legend: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub metrics: Vec<&'static str>,
    pub layout: Layout,
    pub traces: Vec<Trace>,
}

// NaN goes last, like numpy's argsort.
fn cmp_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

/// Orders `visible` by `metric` so that rank grows towards "better".
///
/// Ascending for higher-is-better metrics; the ascending order is reversed
/// for lower-is-better ones. Keys without the metric are left out.
pub fn rank_keys<'a>(stats: &AggStats, visible: &'a [String], metric: &MetricSpec) -> Vec<(&'a str, f64)> {
    let mut ranked: Vec<(&str, f64)> = visible
        .iter()
        .filter_map(|key| {
            stats
                .get(key)
                .and_then(|rec| rec.get(metric.name))
                .map(|v| (key.as_str(), *v))
        })
        .collect();
    ranked.sort_by(|a, b| cmp_nan_last(a.1, b.1));
    if metric.better == Better::LowerBetter {
        ranked.reverse();
    }
    ranked
}

/// Rank-vs-value chart for one metric. Ranks are global over `visible`;
/// each group's trace keeps the global rank of its members.
pub fn ranked_chart(stats: &AggStats, visible: &[String], groups: &[Group], metric: &MetricSpec) -> Chart {
    let ranked = rank_keys(stats, visible, metric);
    let traces = groups
        .iter()
        .enumerate()
        .map(|(idx, group)| {
            let mut trace = Trace::new(idx, &group.label);
            for (rank, (key, value)) in ranked.iter().enumerate() {
                if group.keys.iter().any(|k| k == key) {
                    trace.push(rank as f64, *value, key);
                }
            }
            trace
        })
        .collect();

    Chart {
        metrics: vec![metric.name],
        layout: Layout::new(metric.ranked_title(), RANKED_X_TITLE, metric.axis_title()),
        traces,
    }
}

/// Scatter of metric `x` against metric `y`, one trace per group, in group order.
pub fn paired_chart(stats: &AggStats, groups: &[Group], x: &MetricSpec, y: &MetricSpec) -> Chart {
    let traces = groups
        .iter()
        .enumerate()
        .map(|(idx, group)| {
            let mut trace = Trace::new(idx, &group.label);
            for key in &group.keys {
                let Some(rec) = stats.get(key) else { continue };
                if let (Some(vx), Some(vy)) = (rec.get(x.name), rec.get(y.name)) {
                    trace.push(*vx, *vy, key);
                }
            }
            trace
        })
        .collect();

    Chart {
        metrics: vec![x.name, y.name],
        layout: Layout::new(paired_title(x, y), x.axis_title(), y.axis_title()),
        traces,
    }
}

pub fn ranked_charts(stats: &AggStats, visible: &[String], groups: &[Group]) -> Vec<Chart> {
    METRICS
        .iter()
        .map(|m| ranked_chart(stats, visible, groups, m))
        .collect()
}

pub fn paired_charts(stats: &AggStats, groups: &[Group]) -> Vec<Chart> {
    METRIC_PAIRS
        .iter()
        .filter_map(|(x, y)| Some(paired_chart(stats, groups, metrics::lookup(x)?, metrics::lookup(y)?)))
        .collect()
}

/// One grid row: validation metrics under their base names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub name: String,
    pub calinski_harabasz: Option<f64>,
    pub davies_bouldin: Option<f64>,
    pub silhouette: Option<f64>,
}

/// Rows for every key, or only those matching `filter`, naturally sorted.
pub fn table_rows(stats: &AggStats, index: &SelectionIndex, filter: Option<&FieldFilter>) -> Vec<TableRow> {
    let mut names: Vec<String> = match filter {
        None => stats.keys().cloned().collect(),
        Some(f) => index
            .keys_for(f.field, &f.value)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default(),
    };
    natural_sort(&mut names);

    names
        .into_iter()
        .map(|name| {
            let rec = stats.get(&name);
            let value = |metric: &str| rec.and_then(|r| r.get(metric)).copied();
            TableRow {
                calinski_harabasz: value(TABLE_COLUMNS[0].1),
                davies_bouldin: value(TABLE_COLUMNS[1].1),
                silhouette: value(TABLE_COLUMNS[2].1),
                name,
            }
        })
        .collect()
}

/// Fixed-width text rendering of table rows.
pub fn render_table(rows: &[TableRow], precision: usize) -> String {
    let name_width = rows
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max("name".len());
    let cell = |v: Option<f64>| match v {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    };

    let mut out = String::new();
    let _ = write!(out, "{:<width$}", "name", width = name_width);
    for (column, _) in TABLE_COLUMNS {
        let _ = write!(out, "  {:>18}", column);
    }
    out.push('\n');
    for row in rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:>18}  {:>18}  {:>18}",
            row.name,
            cell(row.calinski_harabasz),
            cell(row.davies_bouldin),
            cell(row.silhouette),
            width = name_width
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::lookup;
    use crate::stats::AggRecord;

    fn stats() -> AggStats {
        let mut s = AggStats::new();
        for (key, sil, db, ch) in [
            ("1000_none_4_welch_none", 0.2, 1.5, 20.0),
            ("2000_none_4_welch_none", 0.5, 0.7, 50.0),
            ("1000_none_4_multitaper_none", 0.3, 2.0, 30.0),
        ] {
            let rec: AggRecord = [
                ("silhouette".to_string(), sil),
                ("davies_bouldin".to_string(), db),
                ("val_silhouette".to_string(), sil),
                ("val_davies_bouldin".to_string(), db),
                ("val_calinski_harabasz".to_string(), ch),
            ]
            .into();
            s.insert(key.to_string(), rec);
        }
        s
    }

    fn visible(s: &AggStats) -> Vec<String> {
        let mut v: Vec<String> = s.keys().cloned().collect();
        natural_sort(&mut v);
        v
    }

    #[test]
    fn ranked_higher_better_is_ascending() {
        let s = stats();
        let vis = visible(&s);
        let ranked = rank_keys(&s, &vis, lookup("silhouette").unwrap());
        let values: Vec<f64> = ranked.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0.2, 0.3, 0.5]);
    }

    #[test]
    fn ranked_lower_better_starts_at_max() {
        let s = stats();
        let vis = visible(&s);
        let ranked = rank_keys(&s, &vis, lookup("davies_bouldin").unwrap());
        assert_eq!(ranked[0], ("1000_none_4_multitaper_none", 2.0));
        assert_eq!(ranked[2].1, 0.7);
    }

    #[test]
    fn group_traces_keep_global_rank() {
        let s = stats();
        let vis = visible(&s);
        let groups = vec![
            Group {
                label: "welch".into(),
                keys: vec!["1000_none_4_welch_none".into(), "2000_none_4_welch_none".into()],
            },
            Group {
                label: "multitaper".into(),
                keys: vec!["1000_none_4_multitaper_none".into()],
            },
        ];
        let chart = ranked_chart(&s, &vis, &groups, lookup("silhouette").unwrap());
        assert_eq!(chart.traces[0].x, vec![0.0, 2.0]);
        assert_eq!(chart.traces[1].x, vec![1.0]);
        assert_eq!(chart.traces[1].text, vec!["1000_none_4_multitaper_none"]);
        assert_eq!(chart.layout.x_title, RANKED_X_TITLE);
        assert_eq!(chart.traces[1].color, "rgba(255, 127, 14, 0.5)");
    }

    #[test]
    fn paired_skips_missing_metrics() {
        let s = stats();
        let groups = vec![Group {
            label: "All".into(),
            keys: visible(&s),
        }];
        let chart = paired_chart(
            &s,
            &groups,
            lookup("calinski_harabasz").unwrap(),
            lookup("davies_bouldin").unwrap(),
        );
        assert!(chart.traces[0].is_empty());

        let chart = paired_chart(
            &s,
            &groups,
            lookup("silhouette").unwrap(),
            lookup("davies_bouldin").unwrap(),
        );
        assert_eq!(chart.traces[0].len(), 3);
        assert_eq!(chart.traces[0].x[0], 0.3);
        assert_eq!(chart.traces[0].y[0], 2.0);
    }

    #[test]
    fn all_charts_built() {
        let s = stats();
        let groups = vec![Group {
            label: "All".into(),
            keys: visible(&s),
        }];
        assert_eq!(ranked_charts(&s, &visible(&s), &groups).len(), 6);
        assert_eq!(paired_charts(&s, &groups).len(), 6);
    }

    #[test]
    fn table_filters_and_sorts() {
        let s = stats();
        let keys = visible(&s);
        let index = SelectionIndex::build(keys.iter().map(String::as_str)).unwrap();
        let rows = table_rows(&s, &index, Some(&FieldFilter::psd_method("welch")));
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["1000_none_4_welch_none", "2000_none_4_welch_none"]);
        assert_eq!(rows[0].silhouette, Some(0.2));
        assert_eq!(rows[0].calinski_harabasz, Some(20.0));

        let text = render_table(&rows, 4);
        assert!(text.contains("0.2000"));
        assert!(text.contains("20.0000"));
        assert!(text.starts_with("name"));
    }
}
