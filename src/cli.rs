// src/cli.rs

use crate::emitter::OutputOptions;
use crate::types::KinematicMode;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Convoy scene extraction and causal-discovery scoring for highway
/// trajectory recordings.
#[derive(Parser, Debug)]
#[command(name = "convoy-scenes")]
#[command(version)]
#[command(about = "Extracts convoy scenes from highway trajectory data", long_about = None)]
pub struct Cli {
    /// YAML file overriding thresholds and logging
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract two-agent convoy scenes from a directory of recordings
    Extract(ExtractArgs),

    /// Score causal discovery results against scene metadata
    #[command(alias = "score")]
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Directory containing <n>_recordingMeta.csv, <n>_tracksMeta.csv, <n>_tracks.csv
    pub input_directory_path: PathBuf,

    /// Directory receiving scene CSV / JSON files
    pub output_directory_path: PathBuf,

    /// Write the kinematic time series of each scene
    #[arg(long)]
    pub csv: bool,

    /// Write the scene descriptor of each scene
    #[arg(long)]
    pub json_meta: bool,

    /// Also write trimmed copies of the raw recording tables here
    #[arg(long)]
    pub trimmed_scene_output_path: Option<PathBuf>,

    /// Velocity columns instead of acceleration
    #[arg(long)]
    pub velocity_variables: bool,

    /// Acceleration, velocity and distance travelled (overrides --velocity-variables)
    #[arg(long)]
    pub all_kinematic_variables: bool,
}

impl ExtractArgs {
    pub fn validate(&self) -> Result<()> {
        require_dir("Input directory path", &self.input_directory_path)?;
        require_dir("Output directory path", &self.output_directory_path)?;
        if let Some(trimmed) = &self.trimmed_scene_output_path {
            require_dir("Trimmed scene output directory path", trimmed)?;
        }
        if !self.csv && !self.json_meta {
            bail!("Please select either CSV or JSON meta output mode");
        }
        Ok(())
    }

    pub fn mode(&self) -> KinematicMode {
        KinematicMode::from_flags(self.velocity_variables, self.all_kinematic_variables)
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            output_dir: self.output_directory_path.clone(),
            csv: self.csv,
            json_meta: self.json_meta,
            trimmed_scene_dir: self.trimmed_scene_output_path.clone(),
            mode: self.mode(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Glob expression selecting causal discovery result files
    pub input_path_expr: String,

    /// Where to write the performance summary JSON
    pub output_file_path: PathBuf,
}

impl EvaluateArgs {
    pub fn validate(&self) -> Result<()> {
        if let Some(parent) = self.output_file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!(
                    "Output file directory {} is not a valid directory",
                    parent.display()
                );
            }
        }
        Ok(())
    }
}

fn require_dir(label: &str, path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("{} {} is not a valid directory", label, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn extract_args(cli: Cli) -> ExtractArgs {
        match cli.command {
            Commands::Extract(args) => args,
            other => panic!("expected extract, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_flags() {
        let cli = parse(&[
            "convoy-scenes",
            "extract",
            "in",
            "out",
            "--csv",
            "--velocity-variables",
            "--all-kinematic-variables",
            "--trimmed-scene-output-path",
            "trim",
        ]);
        let args = extract_args(cli);
        assert!(args.csv);
        assert!(!args.json_meta);
        assert_eq!(args.mode(), KinematicMode::Full);
        assert_eq!(args.trimmed_scene_output_path, Some(PathBuf::from("trim")));
    }

    #[test]
    fn test_validation_requires_output_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let args = extract_args(parse(&["convoy-scenes", "extract", path, path]));
        let err = args.validate().unwrap_err();
        assert!(err.to_string().contains("CSV or JSON"));

        let args = extract_args(parse(&["convoy-scenes", "extract", path, path, "--json-meta"]));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().to_str().unwrap();
        let missing = dir.path().join("nope");
        let missing = missing.to_str().unwrap();

        let args = extract_args(parse(&["convoy-scenes", "extract", missing, good, "--csv"]));
        assert!(args.validate().unwrap_err().to_string().contains("Input directory"));

        let args = extract_args(parse(&["convoy-scenes", "extract", good, missing, "--csv"]));
        assert!(args.validate().unwrap_err().to_string().contains("Output directory"));

        let args = extract_args(parse(&[
            "convoy-scenes",
            "extract",
            good,
            good,
            "--csv",
            "--trimmed-scene-output-path",
            missing,
        ]));
        assert!(args.validate().unwrap_err().to_string().contains("Trimmed scene"));
    }

    #[test]
    fn test_evaluate_args() {
        let cli = parse(&["convoy-scenes", "-v", "score", "results/*.json", "perf.json"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Evaluate(args) => {
                assert_eq!(args.input_path_expr, "results/*.json");
                assert!(args.validate().is_ok());
            }
            other => panic!("expected evaluate, got {:?}", other),
        }
    }
}
