//! Figure files named `<fs_max>_<norm>_<fft_bin_size>_<psd_method>_<normf>[_<variant>...].<ext>`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::keys::{sort_labels, Field, RecordKey, FIELD_COUNT, FIELD_SEP};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::natsort::natural_cmp;

pub const DEFAULT_FIGURE_EXT: &str = ".jpg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureEntry {
    pub key: RecordKey,
    pub path: PathBuf,
}

/// Figures found in one or more directories.
///
/// Entries are keyed by the full file stem; a file with the same stem in a
/// later directory replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct FigureCatalog {
    figures: BTreeMap<String, FigureEntry>,
}

/// Splits a file stem into its record key; extra trailing tokens name a
/// variant of the same experiment and are kept only in the stem.
pub fn figure_key(stem: &str) -> Option<RecordKey> {
    let tokens: Vec<&str> = stem.split(FIELD_SEP).collect();
    if tokens.len() < FIELD_COUNT {
        return None;
    }
    RecordKey::parse(&tokens[..FIELD_COUNT].join(FIELD_SEP)).ok()
}

impl FigureCatalog {
    pub fn scan<P: AsRef<Path>>(dirs: &[P], ext: &str) -> io::Result<Self> {
        let mut catalog = FigureCatalog::default();
        for dir in dirs {
            catalog.add_dir(dir.as_ref(), ext)?;
        }
        logging::info(
            Domain::Figure,
            "figures.scanned",
            obj(&[
                ("dirs", v_num(dirs.len() as f64)),
                ("figures", v_num(catalog.len() as f64)),
            ]),
        );
        Ok(catalog)
    }

    /// Adds the files directly in `dir` whose extension is `ext`.
    pub fn add_dir(&mut self, dir: &Path, ext: &str) -> io::Result<()> {
        let ext = ext.trim_start_matches('.');
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match figure_key(&stem) {
                Some(key) => {
                    self.figures.insert(stem, FigureEntry { key, path });
                }
                None => logging::warn(
                    Domain::Figure,
                    "figure.skipped",
                    obj(&[
                        ("path", v_str(&path.to_string_lossy())),
                        ("reason", v_str("file stem has fewer than 5 fields")),
                    ]),
                ),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FigureEntry> {
        self.figures.values()
    }

    /// Distinct values of `field`, ordered as in the selection index.
    pub fn labels(&self, field: Field) -> Vec<String> {
        let mut labels: Vec<String> = self
            .figures
            .values()
            .map(|e| e.key.get(field).to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        sort_labels(field, &mut labels);
        labels
    }

    /// The first label of every field, or `None` for an empty catalog.
    pub fn default_key(&self) -> Option<RecordKey> {
        let mut fields: [String; FIELD_COUNT] = Default::default();
        for field in Field::ALL {
            fields[field.index()] = self.labels(field).into_iter().next()?;
        }
        Some(RecordKey::from_fields(fields))
    }

    /// Paths whose parsed key equals `key`, naturally sorted.
    pub fn select(&self, key: &RecordKey) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .figures
            .values()
            .filter(|e| &e.key == key)
            .map(|e| e.path.clone())
            .collect();
        paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureImage {
    pub path: PathBuf,
    pub width_px: u32,
}

impl FigureImage {
    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// What the figure panel shows for one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureView {
    pub selection: String,
    pub images: Vec<FigureImage>,
    pub panel_height_px: u32,
}

/// `base_width` scaled by `scale_pct` percent, clamped to `u32::MAX`.
pub fn image_width(base_width: u32, scale_pct: u32) -> u32 {
    let width = u64::from(base_width) * u64::from(scale_pct) / 100;
    u32::try_from(width).unwrap_or(u32::MAX)
}

pub fn figure_view(
    catalog: &FigureCatalog,
    key: &RecordKey,
    base_width: u32,
    scale_pct: u32,
    panel_height: u32,
) -> FigureView {
    let width_px = image_width(base_width, scale_pct);
    let images: Vec<FigureImage> = catalog
        .select(key)
        .into_iter()
        .map(|path| FigureImage { path, width_px })
        .collect();
    logging::debug(
        Domain::Figure,
        "figures.selected",
        obj(&[
            ("selection", v_str(&key.to_string())),
            ("count", v_num(images.len() as f64)),
        ]),
    );
    FigureView {
        selection: key.to_string(),
        images,
        panel_height_px: panel_height,
    }
}
