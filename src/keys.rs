//! Compound record keys: `<fs_max>_<norm>_<fft_bin_size>_<psd_method>_<normf>`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::natsort::natural_cmp;

pub const FIELD_SEP: &str = "_";
pub const FIELD_COUNT: usize = 5;
pub const NONE_LABEL: &str = "none";

/// The five positional axes of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FsMax,
    Norm,
    FftBinSize,
    PsdMethod,
    Normf,
}

/// How a field's distinct values are ordered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOrder {
    Numeric,
    Natural,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::FsMax,
        Field::Norm,
        Field::FftBinSize,
        Field::PsdMethod,
        Field::Normf,
    ];

    pub fn index(self) -> usize {
        match self {
            Field::FsMax => 0,
            Field::Norm => 1,
            Field::FftBinSize => 2,
            Field::PsdMethod => 3,
            Field::Normf => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::FsMax => "fs_max",
            Field::Norm => "norm",
            Field::FftBinSize => "fft_bin_size",
            Field::PsdMethod => "psd_method",
            Field::Normf => "normf",
        }
    }

    /// Control label shown next to the field's selector.
    pub fn display_name(self) -> &'static str {
        match self {
            Field::FsMax => "Fs max",
            Field::Norm => "Norm time",
            Field::FftBinSize => "FFT bin size",
            Field::PsdMethod => "PSD method",
            Field::Normf => "Norm freq",
        }
    }

    pub fn label_order(self) -> LabelOrder {
        match self {
            Field::FsMax | Field::FftBinSize => LabelOrder::Numeric,
            Field::Norm | Field::PsdMethod | Field::Normf => LabelOrder::Natural,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

/// A parsed record key. `to_string` reproduces the original key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    fields: [String; FIELD_COUNT],
}

impl RecordKey {
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let tokens: Vec<&str> = key.split(FIELD_SEP).collect();
        let fields: [String; FIELD_COUNT] = match tokens.as_slice() {
            [a, b, c, d, e] => [a, b, c, d, e].map(|t| t.to_string()),
            _ => {
                return Err(KeyError::FieldCount {
                    key: key.to_string(),
                    found: tokens.len(),
                })
            }
        };
        Ok(Self { fields })
    }

    pub fn from_fields(fields: [String; FIELD_COUNT]) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: Field) -> &str {
        &self.fields[field.index()]
    }

    pub fn fields(&self) -> &[String; FIELD_COUNT] {
        &self.fields
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.join(FIELD_SEP))
    }
}

impl FromStr for RecordKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKey::parse(s)
    }
}

fn numeric_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => natural_cmp(a, b),
    }
}

/// Sorts distinct labels for `field` and moves `none` to the front.
pub fn sort_labels(field: Field, labels: &mut Vec<String>) {
    match field.label_order() {
        LabelOrder::Numeric => labels.sort_by(|a, b| numeric_cmp(a, b)),
        LabelOrder::Natural => labels.sort_by(|a, b| natural_cmp(a, b)),
    }
    if let Some(pos) = labels.iter().position(|l| l == NONE_LABEL) {
        let none = labels.remove(pos);
        labels.insert(0, none);
    }
}
