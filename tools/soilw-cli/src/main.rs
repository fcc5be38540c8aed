//! Simulation runner: drives a full multi-year `soilw-core` simulation
//! from an already-parsed, serialized (JSON) config fixture. The
//! text-config reader and weather-file reader for the external config
//! format live outside this crate; this binary only exercises the
//! core library against fixtures that are already in memory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use soilw_core::error::RunLog;
use soilw_core::run::Run;
use soilw_core::site::{Layer, Site, SwcMinPolicy, VegComposition};
use soilw_core::weather::WeatherYear;

#[derive(Parser, Debug)]
#[command(name = "soilw-cli", about = "Run a soilw-core simulation from a JSON config fixture")]
struct Args {
    /// Path to the JSON run config.
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for the daily CSV.
    #[arg(short, long, default_value = "soilw-out")]
    out: PathBuf,

    /// Suppress per-year progress lines.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Deserialize)]
struct YearInput {
    year: i32,
    weather: WeatherYear,
}

#[derive(Debug, Deserialize)]
struct RunConfig {
    layers: Vec<Layer>,
    swc_min_policy: SwcMinPolicy,
    deep_drain: bool,
    #[serde(default)]
    transp_region_bounds: Vec<usize>,
    latitude_deg: f64,
    longitude_deg: f64,
    elevation_m: f64,
    slope_deg: f64,
    aspect_deg: Option<f64>,
    veg: VegComposition,
    in_north_hemisphere: bool,
    weather_seed_state: u64,
    weather_seed_sequence: u64,
    years: Vec<YearInput>,
}

fn build_site(cfg: &RunConfig, log: &mut RunLog) -> Result<Site> {
    let mut site = Site::initialize(
        cfg.layers.clone(),
        cfg.swc_min_policy,
        cfg.deep_drain,
        &cfg.transp_region_bounds,
        &cfg.veg.critical_swp_bar,
        log,
    )
    .context("site initialization failed")?;
    site.latitude_deg = cfg.latitude_deg;
    site.longitude_deg = cfg.longitude_deg;
    site.elevation_m = cfg.elevation_m;
    site.slope_deg = cfg.slope_deg;
    site.aspect_deg = cfg.aspect_deg;
    Ok(site)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let raw = fs::read_to_string(&args.config)
        .with_context(|| format!("reading config {}", args.config.display()))?;
    let cfg: RunConfig = serde_json::from_str(&raw).context("parsing run config JSON")?;

    let mut init_log = RunLog::new();
    let site = build_site(&cfg, &mut init_log)?;
    for w in init_log.warnings() {
        eprintln!("warning: {w}");
    }

    let mut run = Run::new(
        site,
        cfg.veg.clone(),
        cfg.in_north_hemisphere,
        (cfg.weather_seed_state, cfg.weather_seed_sequence),
    );

    for year in &cfg.years {
        run.simulate_year(year.year, &year.weather)?;
        if run.log.stop_run() {
            anyhow::bail!(
                "simulation stopped in year {}: {}",
                year.year,
                run.log.error_message().unwrap_or("<no message>")
            );
        }
        if !args.quiet {
            eprintln!("year {} done ({} days)", year.year, year.weather.days.len());
        }
    }

    fs::create_dir_all(&args.out).with_context(|| format!("creating output dir {}", args.out.display()))?;
    let daily_path = args.out.join("daily.csv");
    fs::write(&daily_path, run.daily_output.to_csv())
        .with_context(|| format!("writing {}", daily_path.display()))?;

    if !args.quiet {
        eprintln!("wrote {}", daily_path.display());
        eprintln!("audit counters: {:?}", run.counters);
        for w in run.log.warnings() {
            eprintln!("warning: {w}");
        }
    }

    Ok(())
}
