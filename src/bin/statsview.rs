//! Browse precomputed clustering-quality stats and figures.
//!
//! Usage:
//!   statsview <command> <path> [options]
//!
//! Commands:
//!   sources <base>                 - List subdirectories holding caches
//!   aggregate <dir> [options]      - Load, merge and reduce a source
//!   table <dir> [options]          - Validation metrics, one row per key
//!   metrics <dir> [options]        - Ranked and paired chart data
//!   figures <dir>[,<dir>...]       - Figures for one parameter selection
//!
//! Options:
//!   --reduce=<mean|median|max|min>  Reduction over runs (default: STATS_REDUCE or mean)
//!   --save=<name>                   Write the aggregates to <name>.json.gz
//!   --out=<dir>                     Directory for --save; required, and not the source dir
//!   --psd=<method>                  Restrict table rows to one PSD method
//!   --group=<field>                 Group charts by all|fs_max|norm|fft_bin_size|psd_method|normf
//!   --filter=<method>               Keep only keys with this PSD method (welch|multitaper)
//!   --select=<key>                  Figure selection, e.g. 1000_none_4_welch_none
//!   --<field>=<value>               Change one field of the figure selection
//!   --scale=<pct>                   Figure size in percent (10-100)
//!   --height=<px>                   Panel height (100-2000)
//!   --json                          Output as JSON

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clusterview::browser::{
    FigureControl, FiguresPanel, MetricsControl, MetricsPanel, SourceBrowser, TablePanel,
};
use clusterview::cache::{discover_sources, CacheDir, Source};
use clusterview::config::{split_paths, Config};
use clusterview::figures::FigureCatalog;
use clusterview::keys::{Field, RecordKey};
use clusterview::logging::{self, obj, v_str, Domain};
use clusterview::selection::{group_by_choice, is_psd_filter_choice, PSD_FILTER_CHOICES};
use clusterview::stats::{AggStats, Reduction};
use clusterview::views::{render_table, Chart};

#[derive(Debug, Default)]
struct Options {
    reduce: Option<Reduction>,
    save: Option<String>,
    out: Option<PathBuf>,
    psd: String,
    group: Option<Field>,
    filter: String,
    select: Option<RecordKey>,
    fields: Vec<(Field, String)>,
    scale: Option<u32>,
    height: Option<u32>,
    json: bool,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    for arg in args {
        if let Some(v) = arg.strip_prefix("--reduce=") {
            opts.reduce = Some(v.parse().map_err(anyhow::Error::msg)?);
        } else if let Some(v) = arg.strip_prefix("--save=") {
            opts.save = Some(v.to_string());
        } else if let Some(v) = arg.strip_prefix("--out=") {
            opts.out = Some(PathBuf::from(v));
        } else if let Some(v) = arg.strip_prefix("--psd=") {
            opts.psd = psd_choice(v)?;
        } else if let Some(v) = arg.strip_prefix("--group=") {
            opts.group = match v {
                "" => None,
                choice => group_by_choice(choice)
                    .ok_or_else(|| anyhow::anyhow!("unknown --group '{}'", choice))?,
            };
        } else if let Some(v) = arg.strip_prefix("--filter=") {
            opts.filter = psd_choice(v)?;
        } else if let Some(v) = arg.strip_prefix("--select=") {
            opts.select = Some(v.parse()?);
        } else if let Some(v) = arg.strip_prefix("--scale=") {
            opts.scale = Some(v.parse().with_context(|| format!("bad --scale '{}'", v))?);
        } else if let Some(v) = arg.strip_prefix("--height=") {
            opts.height = Some(v.parse().with_context(|| format!("bad --height '{}'", v))?);
        } else if arg == "--json" {
            opts.json = true;
        } else if let Some((name, value)) = arg.strip_prefix("--").and_then(|a| a.split_once('=')) {
            let field: Field = name
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown option: {}", arg))?;
            opts.fields.push((field, value.to_string()));
        } else {
            bail!("unknown option: {}", arg);
        }
    }
    Ok(opts)
}

fn psd_choice(value: &str) -> Result<String> {
    if !is_psd_filter_choice(value) {
        let known: Vec<_> = PSD_FILTER_CHOICES
            .iter()
            .map(|(_, v)| *v)
            .filter(|v| !v.is_empty())
            .collect();
        bail!("unknown PSD method '{}' (expected one of {})", value, known.join(", "));
    }
    Ok(value.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_stats(dir: &Path, reduction: Reduction) -> Result<Arc<AggStats>> {
    let source = Source::open(dir).with_context(|| format!("opening source {}", dir.display()))?;
    if source.names.is_empty() {
        bail!("no .json.gz caches in {}", dir.display());
    }
    let mut browser = SourceBrowser::with_sources(vec![source], reduction);
    Ok(browser.select(dir)?)
}

fn cmd_sources(base: &Path, opts: &Options) -> Result<()> {
    let sources = discover_sources(base)?;
    if opts.json {
        let listing: Vec<_> = sources
            .iter()
            .map(|s| serde_json::json!({"path": s.path, "caches": s.names}))
            .collect();
        return print_json(&listing);
    }
    if sources.is_empty() {
        println!("No sources under {}", base.display());
    }
    for source in &sources {
        println!("{}", source.path.display());
        for name in &source.names {
            println!("  {}", name);
        }
    }
    Ok(())
}

/// Where `--save` writes. A cache saved into the source would be merged
/// back into it on the next load, so the source dir is refused.
fn save_dir(source: &Path, out: Option<&Path>) -> Result<PathBuf> {
    let Some(out) = out else {
        bail!("--save needs --out=<dir> outside the source");
    };
    let same = match (source.canonicalize(), out.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == out,
    };
    if same {
        bail!("--out {} is the source being aggregated", out.display());
    }
    Ok(out.to_path_buf())
}

fn cmd_aggregate(dir: &Path, opts: &Options, cfg: &Config) -> Result<()> {
    let reduction = opts.reduce.unwrap_or(cfg.reduction);
    let stats = load_stats(dir, reduction)?;

    if let Some(name) = &opts.save {
        let out = save_dir(dir, opts.out.as_deref())?;
        CacheDir::new(&out)
            .with_compression(cfg.cache_compression)
            .save(name, stats.as_ref())
            .with_context(|| format!("saving {} to {}", name, out.display()))?;
    }

    if opts.json {
        return print_json(stats.as_ref());
    }
    println!("=== {} ({}) ===\n", dir.display(), reduction);
    println!("Records: {}", stats.len());
    for (key, record) in stats.iter() {
        let metrics: Vec<String> = record
            .iter()
            .map(|(m, v)| format!("{}={:.4}", m, v))
            .collect();
        println!("  {}  {}", key, metrics.join(" "));
    }
    Ok(())
}

fn cmd_table(dir: &Path, opts: &Options, cfg: &Config) -> Result<()> {
    let stats = load_stats(dir, opts.reduce.unwrap_or(cfg.reduction))?;
    let mut panel = TablePanel::new(stats)?;
    let rows = panel.update(&opts.psd);
    if opts.json {
        return print_json(&rows);
    }
    print!("{}", render_table(&rows, 4));
    Ok(())
}

fn print_chart(chart: &Chart) {
    println!("--- {} ---", chart.layout.title);
    println!("  x: {}  y: {}", chart.layout.x_title, chart.layout.y_title);
    for trace in &chart.traces {
        match trace.text.last() {
            Some(last) => println!(
                "  {:<16} n={:<4} last={} ({:.4}, {:.4})",
                trace.name,
                trace.len(),
                last,
                trace.x[trace.len() - 1],
                trace.y[trace.len() - 1]
            ),
            None => println!("  {:<16} n=0", trace.name),
        }
    }
}

fn cmd_metrics(dir: &Path, opts: &Options, cfg: &Config) -> Result<()> {
    let stats = load_stats(dir, opts.reduce.unwrap_or(cfg.reduction))?;
    let mut panel = MetricsPanel::new(stats)?;
    panel.update(MetricsControl::GroupBy(opts.group));
    let view = panel.update(MetricsControl::Filter(opts.filter.clone()));
    if opts.json {
        return print_json(&view);
    }
    println!("=== Ranked ===\n");
    view.ranked.iter().for_each(print_chart);
    println!("\n=== Paired ===\n");
    view.paired.iter().for_each(print_chart);
    Ok(())
}

fn cmd_figures(paths: &str, opts: &Options, cfg: &Config) -> Result<()> {
    let mut dirs = split_paths(paths);
    if dirs.is_empty() {
        dirs = cfg.figure_paths.clone();
    }
    let catalog = FigureCatalog::scan(&dirs, &cfg.figure_ext).context("scanning figure directories")?;
    let Some(mut panel) = FiguresPanel::new(catalog, cfg) else {
        bail!("no figures found in {:?}", dirs);
    };

    if let Some(key) = &opts.select {
        for field in Field::ALL {
            panel.update(FigureControl::Field(field, key.get(field).to_string()));
        }
    }
    for (field, value) in &opts.fields {
        panel.update(FigureControl::Field(*field, value.clone()));
    }
    if let Some(scale) = opts.scale {
        panel.update(FigureControl::Scale(scale));
    }
    if let Some(height) = opts.height {
        panel.update(FigureControl::PanelHeight(height));
    }
    let view = panel.view();

    if opts.json {
        return print_json(&view);
    }
    for field in Field::ALL {
        println!("{:<14} {}", field.display_name(), panel.catalog().labels(field).join(" "));
    }
    println!("\nSelection: {} (panel height {}px)", view.selection, view.panel_height_px);
    if view.images.is_empty() {
        println!("  no figures");
    }
    for image in &view.images {
        println!("  {} [{}px]", image.path.display(), image.width_px);
    }
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: statsview <command> <path> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sources <base>              List sources (subdirectories with caches)");
    eprintln!("  aggregate <dir> [options]   Reduce a source; --reduce, --save, --out");
    eprintln!("  table <dir> [options]       Validation metrics table; --psd");
    eprintln!("  metrics <dir> [options]     Chart data; --group, --filter");
    eprintln!("  figures <dirs> [options]    Figure selection; --select, --<field>, --scale, --height");
    eprintln!();
    eprintln!("  --json                      Output as JSON");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = args[1].as_str();
    let target = args[2].as_str();
    let opts = match parse_options(&args[3..]) {
        Ok(o) => o,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            print_usage();
            std::process::exit(1);
        }
    };
    let cfg = Config::from_env();

    let result = match cmd {
        "sources" => cmd_sources(Path::new(target), &opts),
        "aggregate" => cmd_aggregate(Path::new(target), &opts, &cfg),
        "table" => cmd_table(Path::new(target), &opts, &cfg),
        "metrics" => cmd_metrics(Path::new(target), &opts, &cfg),
        "figures" => cmd_figures(target, &opts, &cfg),
        _ => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        logging::log(
            logging::Level::Error,
            Domain::System,
            "command.failed",
            obj(&[("command", v_str(cmd)), ("error", v_str(&format!("{:#}", err)))]),
        );
        eprintln!("Error: {:#}", err);
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn save_refuses_the_source_dir() {
        let base = TempDir::new().unwrap();
        let source = base.path().join("clustering");
        let out = base.path().join("reduced");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&out).unwrap();

        assert!(save_dir(&source, None).is_err());
        assert!(save_dir(&source, Some(&source)).is_err());
        assert!(save_dir(&source, Some(&source.join("."))).is_err());
        assert_eq!(save_dir(&source, Some(&out)).unwrap(), out);
    }

    #[test]
    fn group_and_filter_follow_the_choice_tables() {
        let opts = parse_options(&args(&["--group=fs_max", "--filter=welch"])).unwrap();
        assert_eq!(opts.group, Some(Field::FsMax));
        assert_eq!(opts.filter, "welch");
        assert_eq!(parse_options(&args(&["--group=All"])).unwrap().group, None);
        assert!(parse_options(&args(&["--group=seed"])).is_err());
        assert!(parse_options(&args(&["--filter=periodogram"])).is_err());
        assert!(parse_options(&args(&["--psd=burg"])).is_err());
    }
}
