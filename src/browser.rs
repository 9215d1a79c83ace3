//! Control state for each panel and the recompute step run on every change.
//!
//! Each panel keeps the current value of its controls; `update` applies one
//! change and returns the freshly derived view model. The derivations
//! themselves (`metrics_view`, `table_view`, `figure_view`) are pure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{discover_sources, Source};
use crate::config::{Config, FIG_SCALE_RANGE, PANEL_HEIGHT_RANGE};
use crate::error::{BrowseError, KeyError};
use crate::figures::{figure_view, FigureCatalog, FigureView};
use crate::keys::{Field, RecordKey};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::natsort::natural_sort;
use crate::selection::{psd_filter, Selection, SelectionIndex};
use crate::stats::{aggregate, AggStats, Reduction};
use crate::views::{paired_charts, ranked_charts, table_rows, Chart, TableRow};

// =============================================================================
// Source selection
// =============================================================================

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub fingerprint: String,
    pub stats: Arc<AggStats>,
}

/// Discovered sources and the working set of the selected one.
///
/// Selecting a source rebuilds the working set from scratch. Panels built
/// from an earlier snapshot keep that snapshot; rebuild them after `select`.
#[derive(Debug)]
pub struct SourceBrowser {
    sources: Vec<Source>,
    reduction: Reduction,
    current: Option<LoadedSource>,
}

impl SourceBrowser {
    pub fn discover(base: &Path, reduction: Reduction) -> Result<Self, BrowseError> {
        Ok(Self::with_sources(discover_sources(base)?, reduction))
    }

    pub fn with_sources(sources: Vec<Source>, reduction: Reduction) -> Self {
        Self {
            sources,
            reduction,
            current: None,
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn current(&self) -> Option<&LoadedSource> {
        self.current.as_ref()
    }

    /// Loads, merges and aggregates every cache of the source at `path`.
    pub fn select(&mut self, path: &Path) -> Result<Arc<AggStats>, BrowseError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.path == path)
            .ok_or_else(|| BrowseError::UnknownSource(path.to_path_buf()))?;

        logging::info(
            Domain::Cache,
            "source.loading",
            obj(&[("msg", v_str("Loading...")), ("path", v_str(&path.to_string_lossy()))]),
        );
        let raw = source.load_raw()?;
        let fingerprint = source.fingerprint()?;
        let stats = Arc::new(aggregate(&raw, self.reduction, None));
        logging::info(
            Domain::Cache,
            "source.loaded",
            obj(&[
                ("msg", v_str(&format!("Loaded data from {}", path.display()))),
                ("path", v_str(&path.to_string_lossy())),
                ("caches", v_num(source.names.len() as f64)),
                ("records", v_num(stats.len() as f64)),
                ("reduction", v_str(self.reduction.as_str())),
                ("sha256", v_str(&fingerprint)),
            ]),
        );

        self.current = Some(LoadedSource {
            path: path.to_path_buf(),
            fingerprint,
            stats: Arc::clone(&stats),
        });
        Ok(stats)
    }
}

/// Keys of the working set in natural order.
pub fn visible_keys(stats: &AggStats) -> Vec<String> {
    let mut keys: Vec<String> = stats.keys().cloned().collect();
    natural_sort(&mut keys);
    keys
}

// =============================================================================
// Metrics panel
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsControl {
    /// `None` groups everything under "All".
    GroupBy(Option<Field>),
    /// Estimation-method filter; `""` disables it.
    Filter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsView {
    pub selection: Selection,
    pub ranked: Vec<Chart>,
    pub paired: Vec<Chart>,
}

pub fn metrics_view(stats: &AggStats, index: &SelectionIndex, visible: &[String], selection: &Selection) -> MetricsView {
    let groups = index.filter(visible, selection);
    let view = MetricsView {
        selection: selection.clone(),
        ranked: ranked_charts(stats, visible, &groups),
        paired: paired_charts(stats, &groups),
    };
    logging::debug(
        Domain::View,
        "metrics.refreshed",
        obj(&[
            ("groups", v_num(groups.len() as f64)),
            ("charts", v_num((view.ranked.len() + view.paired.len()) as f64)),
        ]),
    );
    view
}

#[derive(Debug)]
pub struct MetricsPanel {
    stats: Arc<AggStats>,
    index: SelectionIndex,
    visible: Vec<String>,
    selection: Selection,
}

impl MetricsPanel {
    pub fn new(stats: Arc<AggStats>) -> Result<Self, KeyError> {
        let index = SelectionIndex::build(stats.keys().map(String::as_str))?;
        let visible = visible_keys(&stats);
        Ok(Self {
            stats,
            index,
            visible,
            selection: Selection::default(),
        })
    }

    pub fn index(&self) -> &SelectionIndex {
        &self.index
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn view(&self) -> MetricsView {
        metrics_view(&self.stats, &self.index, &self.visible, &self.selection)
    }

    pub fn update(&mut self, change: MetricsControl) -> MetricsView {
        match change {
            MetricsControl::GroupBy(field) => self.selection.group_by = field,
            MetricsControl::Filter(value) => self.selection.filter = psd_filter(&value),
        }
        self.view()
    }
}

// =============================================================================
// Table panel
// =============================================================================

pub fn table_view(stats: &AggStats, index: &SelectionIndex, psd_method: &str) -> Vec<TableRow> {
    table_rows(stats, index, psd_filter(psd_method).as_ref())
}

#[derive(Debug)]
pub struct TablePanel {
    stats: Arc<AggStats>,
    index: SelectionIndex,
    psd_method: String,
}

impl TablePanel {
    pub fn new(stats: Arc<AggStats>) -> Result<Self, KeyError> {
        let index = SelectionIndex::build(stats.keys().map(String::as_str))?;
        Ok(Self {
            stats,
            index,
            psd_method: String::new(),
        })
    }

    pub fn view(&self) -> Vec<TableRow> {
        table_view(&self.stats, &self.index, &self.psd_method)
    }

    pub fn update(&mut self, psd_method: &str) -> Vec<TableRow> {
        self.psd_method = psd_method.to_string();
        self.view()
    }
}

// =============================================================================
// Figures panel
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FigureControl {
    Field(Field, String),
    PanelHeight(u32),
    Scale(u32),
}

#[derive(Debug)]
pub struct FiguresPanel {
    catalog: FigureCatalog,
    key: RecordKey,
    base_width: u32,
    scale: u32,
    panel_height: u32,
}

impl FiguresPanel {
    /// Starts on the first label of every field; `None` when no figures exist.
    pub fn new(catalog: FigureCatalog, cfg: &Config) -> Option<Self> {
        let key = catalog.default_key()?;
        Some(Self {
            catalog,
            key,
            base_width: cfg.image_base_width,
            scale: FIG_SCALE_RANGE.snap(cfg.fig_scale),
            panel_height: PANEL_HEIGHT_RANGE.snap(cfg.panel_height),
        })
    }

    pub fn catalog(&self) -> &FigureCatalog {
        &self.catalog
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn view(&self) -> FigureView {
        figure_view(&self.catalog, &self.key, self.base_width, self.scale, self.panel_height)
    }

    pub fn update(&mut self, change: FigureControl) -> FigureView {
        match change {
            FigureControl::Field(field, value) => {
                let mut fields = self.key.fields().clone();
                fields[field.index()] = value;
                self.key = RecordKey::from_fields(fields);
            }
            FigureControl::PanelHeight(h) => self.panel_height = PANEL_HEIGHT_RANGE.snap(h),
            FigureControl::Scale(s) => self.scale = FIG_SCALE_RANGE.snap(s),
        }
        self.view()
    }
}
