// src/main.rs

mod cli;
mod config;
mod dataset;
mod emitter;
mod evaluation;
mod extraction;
mod types;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, EvaluateArgs, ExtractArgs};
use dataset::TrajectoryStore;
use emitter::SceneEmitter;
use extraction::{RejectionCounters, SceneExtractor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("convoy_scenes={}", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match &cli.command {
        Commands::Extract(args) => run_extract(args, &config),
        Commands::Evaluate(args) => run_evaluate(args),
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

struct ExtractionStats {
    recordings_found: usize,
    recordings_processed: usize,
    recordings_skipped: usize,
    candidates: usize,
    volatile: usize,
    files_written: usize,
    counters: RejectionCounters,
}

fn run_extract(args: &ExtractArgs, config: &Config) -> Result<()> {
    args.validate()?;

    info!(
        "Extracting convoy scenes from {} ({} variables)",
        args.input_directory_path.display(),
        args.mode().as_str()
    );

    let store = TrajectoryStore::new(&args.input_directory_path);
    let extractor = SceneExtractor::new(config.thresholds.clone());
    let emitter = SceneEmitter::new(args.output_options());

    let recordings = store.find_recordings()?;
    let mut stats = ExtractionStats {
        recordings_found: recordings.len(),
        recordings_processed: 0,
        recordings_skipped: 0,
        candidates: 0,
        volatile: 0,
        files_written: 0,
        counters: RejectionCounters::new(),
    };

    for (idx, files) in recordings.iter().enumerate() {
        info!(
            "Processing recording {} ({} of {})",
            files.number,
            idx + 1,
            recordings.len()
        );

        let data = match files.load()? {
            Some(data) => data,
            None => {
                stats.recordings_skipped += 1;
                continue;
            }
        };

        let report = extractor.extract(files.number, &data);
        for scene in &report.scenes {
            stats.files_written += emitter.emit(scene, &data.frames, files)?.len();
        }

        if report.volatile > 0 {
            info!("{}", report.counters.summary_line());
        }

        stats.recordings_processed += 1;
        stats.candidates += report.candidates;
        stats.volatile += report.volatile;
        stats.counters += &report.counters;
    }

    info!("✓ Extraction complete");
    info!(
        "  Recordings: {} found, {} processed, {} skipped",
        stats.recordings_found, stats.recordings_processed, stats.recordings_skipped
    );
    info!(
        "  Candidates: {} valid, {} volatile",
        stats.candidates, stats.volatile
    );
    info!("  Scenes emitted: {}", stats.counters.successes);
    info!("  Files written: {}", stats.files_written);
    info!("  {}", stats.counters.summary_line());

    Ok(())
}

fn run_evaluate(args: &EvaluateArgs) -> Result<()> {
    args.validate()?;

    let report = evaluation::evaluate(&args.input_path_expr, &args.output_file_path)?;

    let show = |value: Option<f64>| match value {
        Some(v) => format!("{:.4}", v),
        None => "undefined".to_string(),
    };
    info!("✓ Scored {} scene(s)", report.scene_count);
    info!("  Precision: {:.4}", report.precision);
    info!("  Recall:    {}", show(report.recall));
    info!("  Fallout:   {}", show(report.fallout));
    info!("  F1 score:  {}", show(report.f1_score));
    info!(
        "  Execution time: mean {:.3}s, stdev {}",
        report.execution_time.mean,
        show(report.execution_time.stdev)
    );

    Ok(())
}
