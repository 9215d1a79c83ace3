//! Reverse indices from field values to record keys, and grouping of the
//! visible keys under the current control selection.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::KeyError;
use crate::keys::{sort_labels, Field, RecordKey, FIELD_COUNT};
use crate::logging::{self, obj, v_num, v_str, Domain};

pub const ALL_LABEL: &str = "All";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FieldIndex {
    by_value: BTreeMap<String, BTreeSet<String>>,
    labels: Vec<String>,
}

/// Per field: value -> keys carrying it, plus the ordered label list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionIndex {
    fields: [FieldIndex; FIELD_COUNT],
    key_count: usize,
}

impl SelectionIndex {
    /// Decomposes every key into its five fields.
    pub fn build<'a, I>(keys: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = SelectionIndex::default();
        let mut seen = BTreeSet::new();
        for raw in keys {
            let key = RecordKey::parse(raw)?;
            // store the recomposed key; equal to `raw` for any valid key
            let composed = key.to_string();
            for field in Field::ALL {
                index.fields[field.index()]
                    .by_value
                    .entry(key.get(field).to_string())
                    .or_default()
                    .insert(composed.clone());
            }
            seen.insert(composed);
        }
        index.key_count = seen.len();

        for field in Field::ALL {
            let entry = &mut index.fields[field.index()];
            let mut labels: Vec<String> = entry.by_value.keys().cloned().collect();
            sort_labels(field, &mut labels);
            entry.labels = labels;
        }

        logging::debug(
            Domain::Selection,
            "selection.indexed",
            obj(&[("keys", v_num(index.key_count as f64))]),
        );
        Ok(index)
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn labels(&self, field: Field) -> &[String] {
        &self.fields[field.index()].labels
    }

    pub fn keys_for(&self, field: Field, value: &str) -> Option<&BTreeSet<String>> {
        self.fields[field.index()].by_value.get(value)
    }

    pub fn value_map(&self, field: Field) -> &BTreeMap<String, BTreeSet<String>> {
        &self.fields[field.index()].by_value
    }

    /// Groups `stats_list` per label of the selected field, keeping list order.
    pub fn filter(&self, stats_list: &[String], selection: &Selection) -> Vec<Group> {
        let secondary = selection
            .filter
            .as_ref()
            .map(|f| self.keys_for(f.field, &f.value));
        let passes_secondary = |key: &String| match secondary {
            None => true,
            Some(None) => false,
            Some(Some(set)) => set.contains(key),
        };

        let groups: Vec<Group> = match selection.group_by {
            None => vec![Group {
                label: ALL_LABEL.to_string(),
                keys: stats_list.iter().filter(|k| passes_secondary(k)).cloned().collect(),
            }],
            Some(field) => self
                .labels(field)
                .iter()
                .map(|label| {
                    let members = self.keys_for(field, label);
                    Group {
                        label: label.clone(),
                        keys: stats_list
                            .iter()
                            .filter(|k| members.map_or(false, |m| m.contains(*k)))
                            .filter(|k| passes_secondary(k))
                            .cloned()
                            .collect(),
                    }
                })
                .collect(),
        };

        logging::debug(
            Domain::Selection,
            "selection.filtered",
            obj(&[
                ("group_by", v_str(selection.group_by.map_or("", |f| f.as_str()))),
                (
                    "filter",
                    v_str(selection.filter.as_ref().map_or("", |f| f.value.as_str())),
                ),
                ("groups", v_num(groups.len() as f64)),
            ]),
        );
        groups
    }
}

/// Secondary constraint: keep only keys whose `field` equals `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFilter {
    pub field: Field,
    pub value: String,
}

impl FieldFilter {
    pub fn psd_method(value: impl Into<String>) -> Self {
        Self {
            field: Field::PsdMethod,
            value: value.into(),
        }
    }
}

/// Current state of the group-by and filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub group_by: Option<Field>,
    pub filter: Option<FieldFilter>,
}

/// Keys shown under one legend label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub label: String,
    pub keys: Vec<String>,
}

/// Group-by choices, in control order. `None` is "All".
pub const GROUP_BY_CHOICES: [(&str, Option<Field>); 6] = [
    ("All", None),
    ("PSD method", Some(Field::PsdMethod)),
    ("Fs max", Some(Field::FsMax)),
    ("Norm time", Some(Field::Norm)),
    ("FFT bin size", Some(Field::FftBinSize)),
    ("Norm freq", Some(Field::Normf)),
];

/// Estimation-method filter choices. An empty value means no filter.
pub const PSD_FILTER_CHOICES: [(&str, &str); 3] =
    [("All", ""), ("Welch", "welch"), ("Multitaper", "multitaper")];

/// Resolves a group-by value given as a choice label (any case) or a field name.
pub fn group_by_choice(value: &str) -> Option<Option<Field>> {
    GROUP_BY_CHOICES
        .iter()
        .find(|(label, field)| {
            label.eq_ignore_ascii_case(value) || matches!(field, Some(f) if f.as_str() == value)
        })
        .map(|(_, field)| *field)
}

pub fn is_psd_filter_choice(value: &str) -> bool {
    PSD_FILTER_CHOICES.iter().any(|(_, v)| *v == value)
}

/// Maps a filter control value to a secondary filter; `""` disables it.
pub fn psd_filter(value: &str) -> Option<FieldFilter> {
    if value.is_empty() {
        None
    } else {
        Some(FieldFilter::psd_method(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 4] = [
        "1000_none_4_welch_none",
        "2000_none_4_welch_none",
        "1000_zscore_8_multitaper_none",
        "500_zscore_8_multitaper_max",
    ];

    fn index() -> SelectionIndex {
        SelectionIndex::build(KEYS).unwrap()
    }

    fn list() -> Vec<String> {
        KEYS.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn builds_reverse_index_and_labels() {
        let idx = index();
        assert_eq!(idx.key_count(), 4);
        assert_eq!(idx.labels(Field::FsMax), ["500", "1000", "2000"]);
        assert_eq!(idx.labels(Field::Normf), ["none", "max"]);
        let welch = idx.keys_for(Field::PsdMethod, "welch").unwrap();
        assert_eq!(welch.len(), 2);
        assert!(welch.contains("2000_none_4_welch_none"));
    }

    #[test]
    fn index_sets_are_subsets_of_keys() {
        let idx = index();
        let all: BTreeSet<String> = list().into_iter().collect();
        for field in Field::ALL {
            for keys in idx.value_map(field).values() {
                assert!(keys.is_subset(&all));
            }
        }
    }

    #[test]
    fn malformed_key_fails() {
        assert!(SelectionIndex::build(["1000_none_4"]).is_err());
    }

    #[test]
    fn no_group_is_single_all_group() {
        let groups = index().filter(&list(), &Selection::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, ALL_LABEL);
        assert_eq!(groups[0].keys, list());
    }

    #[test]
    fn group_with_secondary_filter() {
        let sel = Selection {
            group_by: Some(Field::FsMax),
            filter: psd_filter("multitaper"),
        };
        let groups = index().filter(&list(), &sel);
        let labels: Vec<_> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["500", "1000", "2000"]);
        assert_eq!(groups[0].keys, vec!["500_zscore_8_multitaper_max"]);
        assert_eq!(groups[1].keys, vec!["1000_zscore_8_multitaper_none"]);
        assert!(groups[2].keys.is_empty());
    }

    #[test]
    fn unknown_filter_value_empties_groups() {
        let sel = Selection {
            group_by: None,
            filter: psd_filter("periodogram"),
        };
        let groups = index().filter(&list(), &sel);
        assert!(groups[0].keys.is_empty());
    }

    #[test]
    fn control_choices_resolve() {
        assert_eq!(group_by_choice("all"), Some(None));
        assert_eq!(group_by_choice("PSD method"), Some(Some(Field::PsdMethod)));
        assert_eq!(group_by_choice("fft_bin_size"), Some(Some(Field::FftBinSize)));
        assert_eq!(group_by_choice("seed"), None);
        assert!(is_psd_filter_choice(""));
        assert!(is_psd_filter_choice("multitaper"));
        assert!(!is_psd_filter_choice("periodogram"));
    }
}
