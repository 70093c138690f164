use clap::{Parser, Subcommand};
use hc_app::{
    AppResult, BackendRegistry, EvalRequest, EvalStage, ProcessRunner, evaluate_with_progress,
    extract_station_series, prepare_instance, summarize_dataset,
};
use hc_core::{DateWindow, UnitRegistry, format_timestamp};
use hc_data::{AssembleOptions, Dataset, ObservationEntry, assemble, prepare_loaded_observations};
use hc_project::ProjectError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hc-cli")]
#[command(about = "hydrocal CLI - hydrological model calibration tool", long_about = None)]
struct Cli {
    /// Log coarse stage timings
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble observation records into a dataset file
    Assemble {
        /// JSON or YAML list of observation records
        entries: PathBuf,
        /// Output dataset file
        #[arg(short, long)]
        output: PathBuf,
        /// Reject unit disagreements instead of converting
        #[arg(long)]
        no_convert: bool,
    },
    /// Restrict a dataset to calibration windows
    Subset {
        /// Input dataset file
        dataset: PathBuf,
        /// Window as START..END, repeatable
        #[arg(short, long = "window", required = true, value_parser = parse_window)]
        windows: Vec<DateWindow>,
        /// Output dataset file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a setup file or an evaluation configuration
    Validate {
        /// Setup (.yaml/.yml/.json) or eval.json
        path: PathBuf,
        /// Treat the file as an evaluation configuration
        #[arg(long)]
        eval: bool,
    },
    /// Prepare a calibration instance from a setup file
    Prepare {
        /// Setup file (.yaml/.yml/.json)
        setup: PathBuf,
        /// Directory relative paths resolve against (defaults to the setup's directory)
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
    /// Run one evaluation: model, metrics, objective artifacts
    Eval {
        /// Path to eval.json
        config: PathBuf,
    },
    /// Summarize a dataset or print one station's series as CSV
    Show {
        /// Dataset file
        dataset: PathBuf,
        /// Variable to print
        #[arg(long, requires = "station")]
        variable: Option<String>,
        /// Station name or `<unit_dim>_<id>`
        #[arg(long, requires = "variable")]
        station: Option<String>,
    },
}

fn parse_window(s: &str) -> Result<DateWindow, String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{s}'"))?;
    DateWindow::parse(start.trim(), end.trim()).map_err(|e| e.to_string())
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.timing {
        hc_core::timing::enable_timing();
    }
    let units = UnitRegistry::with_defaults();

    match cli.command {
        Commands::Assemble {
            entries,
            output,
            no_convert,
        } => cmd_assemble(&entries, &output, !no_convert, &units),
        Commands::Subset {
            dataset,
            windows,
            output,
        } => cmd_subset(&dataset, &windows, &output),
        Commands::Validate { path, eval } => cmd_validate(&path, eval),
        Commands::Prepare { setup, base_dir } => cmd_prepare(&setup, base_dir.as_deref(), &units),
        Commands::Eval { config } => cmd_eval(&config, &units),
        Commands::Show {
            dataset,
            variable,
            station,
        } => cmd_show(&dataset, variable.as_deref().zip(station.as_deref())),
    }
}

fn read_entries(path: &Path) -> AppResult<Vec<ObservationEntry>> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&content).map_err(|e| ProjectError::from(e).into()),
        _ => Ok(serde_json::from_str(&content)?),
    }
}

fn cmd_assemble(entries: &Path, output: &Path, convert_units: bool, units: &UnitRegistry) -> AppResult<()> {
    let records = read_entries(entries)?;
    println!("Assembling {} observation records", records.len());
    let ds = assemble(&records, units, AssembleOptions { convert_units })?;
    let ds = prepare_loaded_observations(&ds, units)?;
    ds.save(output)?;
    println!(
        "✓ Wrote {} ({} units x {} times)",
        output.display(),
        ds.n_units(),
        ds.n_times()
    );
    Ok(())
}

fn cmd_subset(dataset: &Path, windows: &[DateWindow], output: &Path) -> AppResult<()> {
    let ds = Dataset::load(dataset)?;
    let out = hc_eval::subset(&ds, windows)?;
    out.save(output)?;
    println!("✓ Wrote {} ({} times)", output.display(), out.n_times());
    Ok(())
}

fn cmd_validate(path: &Path, eval: bool) -> AppResult<()> {
    println!("Validating: {}", path.display());
    if eval {
        let config = hc_project::load_eval_config(path)?;
        hc_eval::validate_objectives(&config.objective_functions)?;
        hc_app::reducer_table(&config.reducers, config.default_reducer.as_deref())?;
        println!("✓ Evaluation configuration is valid ({} objectives)", config.objective_slots().len());
    } else {
        let setup = hc_project::load_setup(path)?;
        hc_eval::validate_objectives(&setup.calibration_config.objective_functions)?;
        let backends = BackendRegistry::with_builtins();
        backends.create(&setup.calibration_software)?;
        backends.create(&setup.model_software)?;
        println!("✓ Setup is valid");
    }
    Ok(())
}

fn cmd_prepare(setup_path: &Path, base_dir: Option<&Path>, units: &UnitRegistry) -> AppResult<()> {
    let setup = hc_project::load_setup(setup_path)?;
    let base = base_dir
        .or_else(|| setup_path.parent())
        .unwrap_or(Path::new("."));
    let prepared = prepare_instance(&setup, base, &BackendRegistry::with_builtins(), units)?;
    println!("✓ Prepared instance: {}", prepared.plan.instance_dir.display());
    if let Some(alg) = &prepared.plan.algorithm {
        println!("  Algorithm: {alg}");
    }
    println!("  Stations: {}", prepared.summary.stations.join(", "));
    println!("  Evaluation config: {}", prepared.eval_config_path.display());
    println!("  Summary: {}", prepared.summary_path.display());
    Ok(())
}

fn cmd_eval(config: &Path, units: &UnitRegistry) -> AppResult<()> {
    let runner = ProcessRunner::default();
    let request = EvalRequest {
        config_path: config,
        runner: &runner,
        units,
    };
    let outcome = evaluate_with_progress(
        &request,
        Some(&mut |event| {
            print!("\r[{:>6.1}s] {:<16}", event.elapsed_wall_s, event.stage.to_string());
            let _ = io::stdout().flush();
        }),
    )?;
    println!();

    match outcome.stage {
        EvalStage::Scored => {
            for (flux, metrics) in &outcome.scores {
                for (metric, values) in metrics {
                    for (i, v) in values.iter().enumerate() {
                        println!("  {}: {v}", hc_app::artifact_name(flux, metric, i + 1));
                    }
                }
            }
        }
        _ => {
            let reason = outcome.failure.as_deref().unwrap_or("unknown failure");
            eprintln!("✗ Evaluation failed, penalty written: {reason}");
        }
    }
    println!("  Artifacts: {}", outcome.artifacts.len());
    Ok(())
}

fn cmd_show(dataset: &Path, series: Option<(&str, &str)>) -> AppResult<()> {
    let ds = Dataset::load(dataset)?;
    if let Some((variable, station)) = series {
        println!("time,{variable}");
        for (ts, v) in extract_station_series(&ds, variable, station)? {
            println!("{},{v}", format_timestamp(&ts));
        }
        return Ok(());
    }

    let summary = summarize_dataset(&ds);
    println!("Dataset: {}", dataset.display());
    println!("  {}: {}", summary.unit_dim, summary.stations.join(", "));
    match &summary.time_range {
        Some((start, end)) => println!("  time: {} .. {} ({} steps)", start, end, summary.n_times),
        None => println!("  time: empty"),
    }
    if let Some(freq) = &summary.freq {
        println!("  freq: {freq}");
    }
    for var in &summary.variables {
        println!(
            "  {} [{}]: {} values, {} missing",
            var.name,
            var.units.as_deref().unwrap_or("-"),
            var.values,
            var.missing
        );
    }
    Ok(())
}
