use std::path::PathBuf;

use crate::cache::DEFAULT_COMPRESSION;
use crate::figures::DEFAULT_FIGURE_EXT;
use crate::stats::Reduction;

/// Inclusive bounds and step of an integer slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

pub const PANEL_HEIGHT_RANGE: SliderRange = SliderRange { min: 100, max: 2000, step: 50 };
pub const FIG_SCALE_RANGE: SliderRange = SliderRange { min: 10, max: 100, step: 10 };

#[derive(Debug, Clone)]
pub struct Config {
    pub stats_base: PathBuf,
    pub figure_paths: Vec<PathBuf>,
    pub figure_ext: String,
    pub reduction: Reduction,
    pub cache_compression: u32,
    pub image_base_width: u32,
    pub panel_height: u32,
    pub fig_scale: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stats_base: PathBuf::from("."),
            figure_paths: Vec::new(),
            figure_ext: DEFAULT_FIGURE_EXT.to_string(),
            reduction: Reduction::Mean,
            cache_compression: DEFAULT_COMPRESSION,
            image_base_width: 1350,
            panel_height: 800,
            fig_scale: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            stats_base: std::env::var("STATS_BASE").map(PathBuf::from).unwrap_or(d.stats_base),
            figure_paths: std::env::var("FIGURE_PATHS").ok().map(|v| split_paths(&v)).unwrap_or(d.figure_paths),
            figure_ext: std::env::var("FIGURE_EXT").unwrap_or(d.figure_ext),
            reduction: std::env::var("STATS_REDUCE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.reduction),
            cache_compression: std::env::var("CACHE_COMPRESSION").ok().and_then(|v| v.parse().ok()).map(|v: u32| v.min(9)).unwrap_or(d.cache_compression),
            image_base_width: std::env::var("IMAGE_BASE_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(d.image_base_width),
            panel_height: std::env::var("PANEL_HEIGHT").ok().and_then(|v| v.parse().ok()).map(|v| PANEL_HEIGHT_RANGE.snap(v)).unwrap_or(d.panel_height),
            fig_scale: std::env::var("FIG_SCALE").ok().and_then(|v| v.parse().ok()).map(|v| FIG_SCALE_RANGE.snap(v)).unwrap_or(d.fig_scale),
        }
    }
}

impl SliderRange {
    /// Clamps to the range and rounds to the nearest step from `min`.
    pub fn snap(&self, value: u32) -> u32 {
        let clamped = value.clamp(self.min, self.max);
        let steps = (clamped - self.min + self.step / 2) / self.step;
        (self.min + steps * self.step).min(self.max)
    }
}

/// Comma-separated list of paths; blanks are dropped.
pub fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_clamps_and_rounds() {
        assert_eq!(PANEL_HEIGHT_RANGE.snap(0), 100);
        assert_eq!(PANEL_HEIGHT_RANGE.snap(5000), 2000);
        assert_eq!(PANEL_HEIGHT_RANGE.snap(824), 800);
        assert_eq!(PANEL_HEIGHT_RANGE.snap(826), 850);
        assert_eq!(FIG_SCALE_RANGE.snap(55), 60);
        assert_eq!(FIG_SCALE_RANGE.snap(100), 100);
    }

    #[test]
    fn split_paths_drops_blanks() {
        let paths = split_paths("figs/a, ,figs/b,");
        assert_eq!(paths, vec![PathBuf::from("figs/a"), PathBuf::from("figs/b")]);
    }

    #[test]
    fn defaults_match_controls() {
        let cfg = Config::default();
        assert_eq!(cfg.panel_height, PANEL_HEIGHT_RANGE.snap(cfg.panel_height));
        assert_eq!(cfg.fig_scale, FIG_SCALE_RANGE.snap(cfg.fig_scale));
        assert_eq!(cfg.reduction, Reduction::Mean);
        assert_eq!(cfg.cache_compression, 9);
    }
}
