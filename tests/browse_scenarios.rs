//! End-to-end: caches on disk -> source selection -> panels -> view models.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use clusterview::browser::{
    FigureControl, FiguresPanel, MetricsControl, MetricsPanel, SourceBrowser, TablePanel,
};
use clusterview::config::Config;
use clusterview::figures::FigureCatalog;
use clusterview::keys::Field;
use clusterview::selection::SelectionIndex;
use clusterview::stats::Reduction;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

fn write_gz_json(dir: &Path, name: &str, json: &str) {
    let file = fs::File::create(dir.join(format!("{}.json.gz", name))).unwrap();
    let mut enc = GzEncoder::new(file, Compression::best());
    enc.write_all(json.as_bytes()).unwrap();
    enc.finish().unwrap();
}

fn two_file_source(base: &Path) -> std::path::PathBuf {
    let dir = base.join("clustering");
    fs::create_dir(&dir).unwrap();
    write_gz_json(&dir, "a", r#"{"1000_none_4_welch_none": {"silhouette": [0.1, 0.3]}}"#);
    write_gz_json(&dir, "b", r#"{"2000_none_4_welch_none": {"silhouette": [0.5]}}"#);
    dir
}

#[test]
fn merge_aggregate_and_index_two_caches() {
    let base = TempDir::new().unwrap();
    let dir = two_file_source(base.path());

    let mut browser = SourceBrowser::discover(base.path(), Reduction::Mean).unwrap();
    assert_eq!(browser.sources().len(), 1);
    let stats = browser.select(&dir).unwrap();

    let a = stats["1000_none_4_welch_none"]["silhouette"];
    assert!((a - 0.2).abs() < 1e-12);
    assert_eq!(stats["2000_none_4_welch_none"]["silhouette"], 0.5);

    let index = SelectionIndex::build(stats.keys().map(String::as_str)).unwrap();
    let by_fs = index.value_map(Field::FsMax);
    assert_eq!(by_fs.len(), 2);
    assert!(by_fs["1000"].contains("1000_none_4_welch_none"));
    assert!(by_fs["2000"].contains("2000_none_4_welch_none"));
    assert_eq!(index.labels(Field::FsMax), ["1000", "2000"]);
}

#[test]
fn reselecting_replaces_the_working_set() {
    let base = TempDir::new().unwrap();
    let first = two_file_source(base.path());
    let second = base.path().join("other");
    fs::create_dir(&second).unwrap();
    write_gz_json(&second, "c", r#"{"500_none_8_multitaper_none": {"silhouette": [0.7, 0.9]}}"#);

    let mut browser = SourceBrowser::discover(base.path(), Reduction::Max).unwrap();
    let old = browser.select(&first).unwrap();
    let old_panel = TablePanel::new(Arc::clone(&old)).unwrap();

    let new = browser.select(&second).unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new["500_none_8_multitaper_none"]["silhouette"], 0.9);
    assert_eq!(browser.current().unwrap().path, second);

    // a panel built before the switch still shows the old snapshot
    assert_eq!(old_panel.view().len(), 2);
    assert_eq!(TablePanel::new(new).unwrap().view().len(), 1);
}

#[test]
fn davies_bouldin_rank_zero_is_the_worst() {
    let base = TempDir::new().unwrap();
    let dir = base.path().join("db");
    fs::create_dir(&dir).unwrap();
    write_gz_json(
        &dir,
        "runs",
        r#"{
            "1000_none_4_welch_none": {"davies_bouldin": [0.5, 0.7], "silhouette": [0.4]},
            "2000_none_4_welch_none": {"davies_bouldin": [2.0, 2.2], "silhouette": [0.1]},
            "4000_none_4_multitaper_none": {"davies_bouldin": [1.0], "silhouette": [0.2]}
        }"#,
    );

    let mut browser = SourceBrowser::discover(base.path(), Reduction::Mean).unwrap();
    let stats = browser.select(&dir).unwrap();
    let mut panel = MetricsPanel::new(stats).unwrap();
    let view = panel.update(MetricsControl::GroupBy(Some(Field::PsdMethod)));

    let db = view
        .ranked
        .iter()
        .find(|c| c.metrics == ["davies_bouldin"])
        .unwrap();
    let welch = db.traces.iter().find(|t| t.name == "welch").unwrap();
    assert_eq!(welch.x, vec![0.0, 2.0]);
    assert_eq!(welch.text[0], "2000_none_4_welch_none");
    assert!((welch.y[0] - 2.1).abs() < 1e-12);

    let multitaper = db.traces.iter().find(|t| t.name == "multitaper").unwrap();
    assert_eq!(multitaper.x, vec![1.0]);

    let paired = &view.paired[2];
    assert_eq!(paired.metrics, ["silhouette", "davies_bouldin"]);
    assert_eq!(paired.layout.title, "Silhouette coefficient vs Davies Bouldin index");
    assert_eq!(paired.traces.iter().map(|t| t.len()).sum::<usize>(), 3);
}

#[test]
fn figures_panel_follows_controls() {
    let figs = TempDir::new().unwrap();
    for name in [
        "1000_none_4_welch_none.jpg",
        "1000_none_4_multitaper_none.jpg",
        "10000_none_4_welch_none.jpg",
    ] {
        fs::write(figs.path().join(name), name.as_bytes()).unwrap();
    }

    let cfg = Config::default();
    let catalog = FigureCatalog::scan(&[figs.path()], &cfg.figure_ext).unwrap();
    let mut panel = FiguresPanel::new(catalog, &cfg).unwrap();

    let view = panel.view();
    assert_eq!(view.selection, "1000_none_4_multitaper_none");
    assert_eq!(view.images.len(), 1);
    assert_eq!(view.images[0].width_px, 1350);
    assert_eq!(view.panel_height_px, 800);

    let view = panel.update(FigureControl::Field(Field::PsdMethod, "welch".into()));
    assert_eq!(view.images.len(), 1);
    assert!(view.images[0].path.ends_with("1000_none_4_welch_none.jpg"));

    let view = panel.update(FigureControl::Scale(35));
    assert_eq!(view.images[0].width_px, 540);

    let view = panel.update(FigureControl::PanelHeight(99_999));
    assert_eq!(view.panel_height_px, 2000);

    let view = panel.update(FigureControl::Field(Field::Normf, "max".into()));
    assert!(view.images.is_empty());
}
