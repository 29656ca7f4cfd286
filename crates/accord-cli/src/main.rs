use accord_lib::{
    io::{recipe as recipe_io, table, text as text_io},
    lag::{estimate_lag, LagConfig},
    metrics::matching::match_events,
    metrics::rate::AgreementRow,
    pipeline::{
        validate_inputs, windowed_match, windowed_rate_agreement, CompareConfig, LagMode, MatchRow,
    },
    signal::Events,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "accord",
    version,
    about = "Agreement metrics for paired peak-event streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LagFlag {
    Off,
    Fixed,
    Estimated,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TableFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Whole-record match quality between two peak index files
    MatchScore {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        test: PathBuf,
        #[arg(long, default_value_t = 200.0)]
        fs: f64,
        #[arg(long, default_value_t = 0.05)]
        tolerance_s: f64,
    },
    /// Windowed match quality after lag alignment, one row per epoch
    WindowedMatch {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        test: PathBuf,
        #[arg(long, default_value_t = 256.0)]
        fs: f64,
        #[arg(long, default_value_t = 30.0)]
        window_s: f64,
        #[arg(long, default_value_t = 0.15)]
        tolerance_s: f64,
        #[arg(long, default_value_t = 0.20)]
        min_ptt_s: f64,
        #[arg(long, default_value_t = 0.54)]
        max_ptt_s: f64,
        #[arg(long, default_value_t = 300)]
        smoothing_len: usize,
        #[arg(long)]
        lag: Option<LagFlag>,
        #[arg(long, default_value_t = 0.45)]
        fixed_lag_s: f64,
        #[arg(long, default_value = "csv")]
        format: TableFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Windowed instantaneous-rate agreement, one row per epoch
    RateAgreement {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        test: PathBuf,
        #[arg(long, default_value_t = 256.0)]
        fs: f64,
        #[arg(long, default_value_t = 30.0)]
        window_s: f64,
        #[arg(long, value_delimiter = ',', default_values_t = [1.0, 2.0, 3.0, 4.0, 5.0])]
        levels: Vec<f64>,
        #[arg(long, default_value_t = 10)]
        outlier_window: usize,
        #[arg(long, default_value_t = 50.0)]
        outlier_percent: f64,
        #[arg(long)]
        lag: Option<LagFlag>,
        #[arg(long, default_value_t = 0.45)]
        fixed_lag_s: f64,
        #[arg(long, default_value = "csv")]
        format: TableFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Estimate the per-event lag between two peak index files
    EstimateLag {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        test: PathBuf,
        #[arg(long, default_value_t = 256.0)]
        fs: f64,
        #[arg(long, default_value_t = 0.20)]
        min_ptt_s: f64,
        #[arg(long, default_value_t = 0.54)]
        max_ptt_s: f64,
        #[arg(long, default_value_t = 300)]
        smoothing_len: usize,
    },
    /// Run a comparison described by a TOML recipe
    Run {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        test: PathBuf,
        #[arg(long, default_value = "csv")]
        format: TableFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a synthetic reference/test peak file pair
    Simulate {
        #[arg(long, default_value_t = 256.0)]
        fs: f64,
        #[arg(long, default_value_t = 300.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 0.8)]
        mean_rr_s: f64,
        #[arg(long, default_value_t = 0.05)]
        rr_jitter_s: f64,
        #[arg(long, default_value_t = 0.30)]
        lag_s: f64,
        #[arg(long, default_value_t = 0.01)]
        detection_jitter_s: f64,
        #[arg(long, default_value_t = 0.0)]
        dropout: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        out_reference: PathBuf,
        #[arg(long)]
        out_test: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::MatchScore {
            reference,
            test,
            fs,
            tolerance_s,
        } => cmd_match_score(&reference, &test, fs, tolerance_s)?,
        Commands::WindowedMatch {
            reference,
            test,
            fs,
            window_s,
            tolerance_s,
            min_ptt_s,
            max_ptt_s,
            smoothing_len,
            lag,
            fixed_lag_s,
            format,
            out,
        } => {
            let cfg = CompareConfig {
                window_s,
                tolerance_s,
                min_ptt_s,
                max_ptt_s,
                smoothing_len,
                lag: lag_override(lag, fixed_lag_s),
                ..CompareConfig::default()
            };
            cmd_windowed_match(&reference, &test, fs, &cfg, format, out.as_deref())?
        }
        Commands::RateAgreement {
            reference,
            test,
            fs,
            window_s,
            levels,
            outlier_window,
            outlier_percent,
            lag,
            fixed_lag_s,
            format,
            out,
        } => {
            let cfg = CompareConfig {
                window_s,
                tolerance_bpm_levels: levels,
                outlier_window,
                outlier_percent,
                lag: lag_override(lag, fixed_lag_s),
                ..CompareConfig::default()
            };
            cmd_rate_agreement(&reference, &test, fs, &cfg, format, out.as_deref())?
        }
        Commands::EstimateLag {
            reference,
            test,
            fs,
            min_ptt_s,
            max_ptt_s,
            smoothing_len,
        } => {
            let cfg = LagConfig {
                min_lag_s: min_ptt_s,
                max_lag_s: max_ptt_s,
                smoothing_len,
            };
            cmd_estimate_lag(&reference, &test, fs, &cfg)?
        }
        Commands::Run {
            config,
            reference,
            test,
            format,
            out,
        } => cmd_run(&config, &reference, &test, format, out.as_deref())?,
        Commands::Simulate {
            fs,
            duration_s,
            mean_rr_s,
            rr_jitter_s,
            lag_s,
            detection_jitter_s,
            dropout,
            seed,
            out_reference,
            out_test,
        } => cmd_simulate(
            fs,
            duration_s,
            mean_rr_s,
            rr_jitter_s,
            lag_s,
            detection_jitter_s,
            dropout,
            seed,
            &out_reference,
            &out_test,
        )?,
    }
    Ok(())
}

fn lag_override(flag: Option<LagFlag>, fixed_lag_s: f64) -> Option<LagMode> {
    flag.map(|f| match f {
        LagFlag::Off => LagMode::Off,
        LagFlag::Fixed => LagMode::Fixed(fixed_lag_s),
        LagFlag::Estimated => LagMode::Estimated,
    })
}

fn load_streams(reference: &Path, test: &Path) -> Result<(Events, Events)> {
    let reference = text_io::read_events(reference)?;
    let test = text_io::read_events(test)?;
    Ok((reference, test))
}

fn emit_match_table(rows: &[MatchRow], format: TableFormat, out: Option<&Path>) -> Result<()> {
    match format {
        TableFormat::Csv => match out {
            Some(path) => {
                let file = fs::File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                table::write_match_csv(file, rows)?;
            }
            None => table::write_match_csv(io::stdout().lock(), rows)?,
        },
        TableFormat::Json => {
            let js = serde_json::to_string(rows)?;
            match out {
                Some(path) => fs::write(path, js)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", js),
            }
        }
    }
    Ok(())
}

fn emit_agreement_table(
    levels: &[f64],
    rows: &[AgreementRow],
    format: TableFormat,
    out: Option<&Path>,
) -> Result<()> {
    match format {
        TableFormat::Csv => match out {
            Some(path) => {
                let file = fs::File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                table::write_agreement_csv(file, levels, rows)?;
            }
            None => table::write_agreement_csv(io::stdout().lock(), levels, rows)?,
        },
        TableFormat::Json => {
            let js = table::agreement_rows_json(levels, rows).to_string();
            match out {
                Some(path) => fs::write(path, js)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", js),
            }
        }
    }
    Ok(())
}

fn cmd_match_score(reference: &Path, test: &Path, fs: f64, tolerance_s: f64) -> Result<()> {
    let (reference, test) = load_streams(reference, test)?;
    validate_inputs(&reference, &test, fs)?;
    let mut result = match_events(&reference, &test, tolerance_s * fs);
    // the matcher works in samples; MeanDist is reported in seconds
    result.mean_distance = result.mean_distance.map(|d| d / fs);
    info!(
        "matched {} of {} reference events",
        result.true_positives,
        reference.len()
    );
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_windowed_match(
    reference: &Path,
    test: &Path,
    fs: f64,
    cfg: &CompareConfig,
    format: TableFormat,
    out: Option<&Path>,
) -> Result<()> {
    let (reference, test) = load_streams(reference, test)?;
    let rows = windowed_match(&reference, &test, fs, cfg)?;
    info!("scored {} windows of {} s", rows.len(), cfg.window_s);
    emit_match_table(&rows, format, out)
}

fn cmd_rate_agreement(
    reference: &Path,
    test: &Path,
    fs: f64,
    cfg: &CompareConfig,
    format: TableFormat,
    out: Option<&Path>,
) -> Result<()> {
    let (reference, test) = load_streams(reference, test)?;
    let rows = windowed_rate_agreement(&reference, &test, fs, cfg)?;
    info!("scored {} windows of {} s", rows.len(), cfg.window_s);
    emit_agreement_table(&cfg.tolerance_bpm_levels, &rows, format, out)
}

fn cmd_estimate_lag(reference: &Path, test: &Path, fs: f64, cfg: &LagConfig) -> Result<()> {
    let (reference, test) = load_streams(reference, test)?;
    validate_inputs(&reference, &test, fs)?;
    let lag = estimate_lag(&reference, &test, fs, cfg)?;
    if lag.unresolved > 0 {
        warn!(
            "{} reference intervals had no candidate test event",
            lag.unresolved
        );
    }
    let summary = serde_json::json!({
        "count": lag.len(),
        "unresolved": lag.unresolved,
        "mean_s": if lag.is_empty() { None } else { Some(lag.mean_samples() / fs) },
        "min_s": lag.samples.iter().min().map(|&v| v as f64 / fs),
        "max_s": lag.samples.iter().max().map(|&v| v as f64 / fs),
    });
    println!("{}", summary);
    Ok(())
}

fn cmd_run(
    config: &Path,
    reference: &Path,
    test: &Path,
    format: TableFormat,
    out: Option<&Path>,
) -> Result<()> {
    let recipe = recipe_io::read_recipe(config)?;
    let (reference, test) = load_streams(reference, test)?;
    info!("running {:?} at {} Hz", recipe.mode, recipe.fs);
    match recipe.mode {
        recipe_io::RecipeMode::WindowedMatch => {
            let rows = windowed_match(&reference, &test, recipe.fs, &recipe.params)?;
            emit_match_table(&rows, format, out)
        }
        recipe_io::RecipeMode::RateAgreement => {
            let rows = windowed_rate_agreement(&reference, &test, recipe.fs, &recipe.params)?;
            emit_agreement_table(&recipe.params.tolerance_bpm_levels, &rows, format, out)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    fs: f64,
    duration_s: f64,
    mean_rr_s: f64,
    rr_jitter_s: f64,
    lag_s: f64,
    detection_jitter_s: f64,
    dropout: f64,
    seed: u64,
    out_reference: &Path,
    out_test: &Path,
) -> Result<()> {
    if !(fs.is_finite() && fs > 0.0) {
        bail!("sample rate must be positive, got {fs}");
    }
    if mean_rr_s <= 0.0 || duration_s <= 0.0 {
        bail!("mean interval and duration must be positive");
    }
    if rr_jitter_s < 0.0 || rr_jitter_s >= mean_rr_s {
        bail!("interval jitter must stay below the mean interval");
    }
    if lag_s < 0.0 || detection_jitter_s < 0.0 {
        bail!("lag and detection jitter must be non-negative");
    }
    if !(0.0..1.0).contains(&dropout) {
        bail!("dropout must be in [0, 1), got {dropout}");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut reference = Vec::new();
    let mut test = Vec::new();
    let mut t = mean_rr_s;
    while t < duration_s {
        reference.push((t * fs).round() as usize);
        if dropout == 0.0 || rng.gen::<f64>() >= dropout {
            let jitter = if detection_jitter_s > 0.0 {
                rng.gen_range(-detection_jitter_s..=detection_jitter_s)
            } else {
                0.0
            };
            test.push(((t + lag_s + jitter) * fs).round() as usize);
        }
        let wobble = if rr_jitter_s > 0.0 {
            rng.gen_range(-rr_jitter_s..=rr_jitter_s)
        } else {
            0.0
        };
        t += mean_rr_s + wobble;
    }
    reference.dedup();
    test.sort_unstable();
    test.dedup();

    let reference = Events::from_indices(reference);
    let test = Events::from_indices(test);
    text_io::write_events(out_reference, &reference)?;
    text_io::write_events(out_test, &test)?;
    info!(
        "wrote {} reference and {} test events",
        reference.len(),
        test.len()
    );
    println!(
        "{}",
        serde_json::json!({
            "reference_events": reference.len(),
            "test_events": test.len(),
            "fs": fs,
            "seed": seed,
        })
    );
    Ok(())
}
