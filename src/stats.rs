//! Per-run metric values and their reduction to one scalar per metric.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};

/// One metric's values across repeated runs (seeds).
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(transparent)]
pub struct RunValues(pub Vec<f64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RunValuesRepr {
    Scalar(Option<f64>),
    List(Vec<Option<f64>>),
    NdArray {
        #[serde(rename = "__ndarray__")]
        values: NdValues,
        #[serde(default)]
        #[allow(dead_code)]
        dtype: Option<String>,
        #[serde(default)]
        #[allow(dead_code)]
        shape: Option<Vec<usize>>,
    },
}

// numpy arrays written by the producer may be nested (one row per run).
// `null` stands for a non-finite value: serde_json writes NaN that way.
#[derive(Deserialize)]
#[serde(untagged)]
enum NdValues {
    Scalar(Option<f64>),
    Nested(Vec<NdValues>),
}

impl NdValues {
    fn flatten_into(self, out: &mut Vec<f64>) {
        match self {
            NdValues::Scalar(v) => out.push(v.unwrap_or(f64::NAN)),
            NdValues::Nested(items) => items.into_iter().for_each(|i| i.flatten_into(out)),
        }
    }
}

impl<'de> Deserialize<'de> for RunValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RunValuesRepr::deserialize(deserializer)? {
            RunValuesRepr::Scalar(v) => RunValues(vec![v.unwrap_or(f64::NAN)]),
            RunValuesRepr::List(values) => {
                RunValues(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            }
            RunValuesRepr::NdArray { values, .. } => {
                let mut out = Vec::new();
                values.flatten_into(&mut out);
                RunValues(out)
            }
        })
    }
}

impl From<Vec<f64>> for RunValues {
    fn from(values: Vec<f64>) -> Self {
        RunValues(values)
    }
}

impl RunValues {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// metric name -> per-run values
pub type RawRecord = BTreeMap<String, RunValues>;
/// record key -> raw record
pub type RawStats = BTreeMap<String, RawRecord>;
/// metric name -> reduced value
pub type AggRecord = BTreeMap<String, f64>;
/// record key -> aggregated record
pub type AggStats = BTreeMap<String, AggRecord>;

/// Reduction applied along the run axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Mean,
    Median,
    Max,
    Min,
}

impl Reduction {
    pub fn as_str(self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::Max => "max",
            Reduction::Min => "min",
        }
    }

    /// Empty input and NaN-containing input both reduce to NaN.
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() || values.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        match self {
            Reduction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reduction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Reduction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reduction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "max" => Ok(Reduction::Max),
            "min" => Ok(Reduction::Min),
            other => Err(format!("unknown reduction '{}'", other)),
        }
    }
}

/// Reduces every metric of every record with `reduction`.
///
/// When `selected` is given, metrics outside it are dropped from the output;
/// a selection matching nothing leaves each record empty.
pub fn aggregate(stats: &RawStats, reduction: Reduction, selected: Option<&[&str]>) -> AggStats {
    let _scope = ProfileScope::with_context(
        "aggregate",
        &[("reduction", v_str(reduction.as_str())), ("records", v_num(stats.len() as f64))],
    );
    let out = aggregate_with(stats, |v| reduction.apply(v), selected);
    logging::debug(
        Domain::Stats,
        "stats.aggregated",
        obj(&[
            ("reduction", v_str(reduction.as_str())),
            ("records", v_num(out.len() as f64)),
        ]),
    );
    out
}

/// Same as [`aggregate`] with an arbitrary reduction function.
pub fn aggregate_with<F>(stats: &RawStats, reduce: F, selected: Option<&[&str]>) -> AggStats
where
    F: Fn(&[f64]) -> f64,
{
    stats
        .iter()
        .map(|(key, record)| {
            let reduced = record
                .iter()
                .filter(|(metric, _)| selected.map_or(true, |sel| sel.contains(&metric.as_str())))
                .map(|(metric, values)| (metric.clone(), reduce(values.as_slice())))
                .collect::<AggRecord>();
            (key.clone(), reduced)
        })
        .collect()
}
