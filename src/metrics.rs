//! Catalog of clustering-quality metrics and the charts built from them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Better {
    HigherBetter,
    LowerBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub better: Better,
    pub validation: bool,
}

const VALIDATION_SUFFIX: &str = " Validation";

pub const METRICS: [MetricSpec; 6] = [
    MetricSpec {
        name: "silhouette",
        display_name: "Silhouette coefficient (higher better)",
        better: Better::HigherBetter,
        validation: false,
    },
    MetricSpec {
        name: "val_silhouette",
        display_name: "Silhouette coefficient (higher better) Validation",
        better: Better::HigherBetter,
        validation: true,
    },
    MetricSpec {
        name: "calinski_harabasz",
        display_name: "Calinski Harabasz index (higher better)",
        better: Better::HigherBetter,
        validation: false,
    },
    MetricSpec {
        name: "val_calinski_harabasz",
        display_name: "Calinski Harabasz index (higher better) Validation",
        better: Better::HigherBetter,
        validation: true,
    },
    MetricSpec {
        name: "davies_bouldin",
        display_name: "Davies Bouldin index (lower better)",
        better: Better::LowerBetter,
        validation: false,
    },
    MetricSpec {
        name: "val_davies_bouldin",
        display_name: "Davies Bouldin index (lower better) Validation",
        better: Better::LowerBetter,
        validation: true,
    },
];

/// (x, y) pairs for the metric-vs-metric scatter charts.
pub const METRIC_PAIRS: [(&str, &str); 6] = [
    ("calinski_harabasz", "davies_bouldin"),
    ("val_calinski_harabasz", "val_davies_bouldin"),
    ("silhouette", "davies_bouldin"),
    ("val_silhouette", "val_davies_bouldin"),
    ("calinski_harabasz", "silhouette"),
    ("val_calinski_harabasz", "val_silhouette"),
];

/// Table columns: (column name, metric read for it).
pub const TABLE_COLUMNS: [(&str, &str); 3] = [
    ("calinski_harabasz", "val_calinski_harabasz"),
    ("davies_bouldin", "val_davies_bouldin"),
    ("silhouette", "val_silhouette"),
];

pub fn lookup(name: &str) -> Option<&'static MetricSpec> {
    METRICS.iter().find(|m| m.name == name)
}

impl MetricSpec {
    /// Display name up to the parenthetical, e.g. "Silhouette coefficient".
    pub fn short_name(&self) -> &'static str {
        self.display_name
            .split(" (")
            .next()
            .unwrap_or(self.display_name)
    }

    /// Display name without the validation suffix, used as an axis title.
    pub fn axis_title(&self) -> &'static str {
        self.display_name
            .strip_suffix(VALIDATION_SUFFIX)
            .unwrap_or(self.display_name)
    }

    pub fn ranked_title(&self) -> String {
        if self.validation {
            format!("{} (Validation)", self.short_name())
        } else {
            self.short_name().to_string()
        }
    }
}

pub fn paired_title(x: &MetricSpec, y: &MetricSpec) -> String {
    let mut title = format!("{} vs {}", x.short_name(), y.short_name());
    if x.validation {
        title.push_str(" (Validation)");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_pairs_and_columns() {
        for (x, y) in METRIC_PAIRS {
            assert!(lookup(x).is_some(), "{}", x);
            assert!(lookup(y).is_some(), "{}", y);
        }
        for (_, metric) in TABLE_COLUMNS {
            assert!(lookup(metric).unwrap().validation);
        }
    }

    #[test]
    fn lower_is_better_only_for_davies_bouldin() {
        let lower: Vec<_> = METRICS
            .iter()
            .filter(|m| m.better == Better::LowerBetter)
            .map(|m| m.name)
            .collect();
        assert_eq!(lower, vec!["davies_bouldin", "val_davies_bouldin"]);
    }

    #[test]
    fn titles() {
        let m = lookup("val_silhouette").unwrap();
        assert_eq!(m.ranked_title(), "Silhouette coefficient (Validation)");
        assert_eq!(m.axis_title(), "Silhouette coefficient (higher better)");

        let x = lookup("calinski_harabasz").unwrap();
        let y = lookup("davies_bouldin").unwrap();
        assert_eq!(paired_title(x, y), "Calinski Harabasz index vs Davies Bouldin index");
        assert_eq!(x.ranked_title(), "Calinski Harabasz index");
    }
}
