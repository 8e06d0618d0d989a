//! lagwatch CLI Module
//!
//! Command-line interface over a directory of CSV tables: harmonize the
//! yearly extracts, train the classifier, score students and inspect a
//! saved model.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AppConfig;
use crate::inference::{predict_students, ModelHandle, StudentFeatures};
use crate::pipeline::HarmonizationPipeline;
use crate::store::{write_csv, CsvDirectoryStore};
use crate::training::train;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}
fn warn(s: &str) -> ColoredString {
    s.truecolor(230, 180, 80)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", "›".truecolor(120, 170, 255), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: impl std::fmt::Display) {
    println!("  {:<16} {}", muted(key), val.to_string().white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lagwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harmonize student-performance records and predict academic lag worsening")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file; missing fields use defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harmonize the raw yearly tables into one CSV
    Prepare {
        /// Directory holding raw_data_<year>.csv files
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output CSV
        #[arg(short, long, default_value = "prepared.csv")]
        output: PathBuf,

        /// Also write the outlier report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Harmonize and train the lag-worsening model
    Train {
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Where to save the model
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Score students from a JSON file holding an array of feature records
    Predict {
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// JSON input
        #[arg(short, long)]
        input: PathBuf,

        /// Probability threshold; defaults to the configured one
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Show a saved model's features, importances and metrics
    Info {
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    Ok(match path {
        Some(p) => AppConfig::from_json_file(p)?,
        None => AppConfig::default(),
    })
}

fn prepared_dataset(config: &AppConfig, data: Option<&Path>) -> anyhow::Result<crate::pipeline::PreparedDataset> {
    let data_dir = data.unwrap_or(config.data_dir.as_path());

    step_run(&format!("Harmonizing {}", data_dir.display()));
    let start = Instant::now();
    let store = CsvDirectoryStore::new(data_dir);
    let pipeline = HarmonizationPipeline::new(config.pipeline.clone())?;
    let dataset = pipeline.run(&store)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        dataset.frame.height(),
        dataset.frame.width(),
        start.elapsed()
    ));

    if !dataset.findings.is_empty() {
        println!(
            "  {} {} values could not be normalized",
            warn("!"),
            dataset.findings.len()
        );
    }
    Ok(dataset)
}

pub fn cmd_prepare(
    config: &AppConfig,
    data: Option<&Path>,
    output: &Path,
    report: Option<&Path>,
) -> anyhow::Result<()> {
    section("Prepare");

    let mut dataset = prepared_dataset(config, data)?;
    write_csv(&mut dataset.frame, output)?;
    kv("Output", output.display());

    if let Some(path) = report {
        std::fs::write(path, dataset.outlier_report.to_json()?)?;
        kv("Report", path.display());
    }

    println!();
    println!("{}", dataset.outlier_report);
    Ok(())
}

pub fn cmd_train(config: &AppConfig, data: Option<&Path>, model: Option<&Path>) -> anyhow::Result<()> {
    section("Train");

    let dataset = prepared_dataset(config, data)?;

    step_run("Training random forest");
    let start = Instant::now();
    let trained = train(&dataset.frame, &config.training)?;
    step_done(&format!("{:?}", start.elapsed()));

    let path = model.unwrap_or(config.model_path.as_path());
    trained.save(path)?;

    let metrics = trained.metrics();
    println!();
    kv("Accuracy", format!("{:.4}", metrics.accuracy));
    kv("F1", format!("{:.4}", metrics.f1));
    kv("AUC-ROC", format!("{:.4}", metrics.auc_roc));
    kv("CV F1", format!("{:.4} ± {:.4}", metrics.cv_f1_mean, metrics.cv_f1_std));
    kv("Model", path.display());
    println!();
    Ok(())
}

pub fn cmd_predict(
    config: &AppConfig,
    model: Option<&Path>,
    input: &Path,
    threshold: Option<f64>,
) -> anyhow::Result<()> {
    let handle = ModelHandle::from_path(model.unwrap_or(config.model_path.as_path()));
    let students: Vec<StudentFeatures> = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    let threshold = threshold.unwrap_or(config.training.threshold);

    let predictions = predict_students(&*handle.get()?, &students, threshold)?;
    println!("{}", serde_json::to_string_pretty(&predictions)?);
    Ok(())
}

pub fn cmd_info(config: &AppConfig, model: Option<&Path>) -> anyhow::Result<()> {
    section("Model");

    let handle = ModelHandle::from_path(model.unwrap_or(config.model_path.as_path()));
    let model = handle.get()?;
    println!("{}", model.summary());
    Ok(())
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Prepare { data, output, report } => {
            cmd_prepare(&config, data.as_deref(), &output, report.as_deref())
        }
        Commands::Train { data, model } => cmd_train(&config, data.as_deref(), model.as_deref()),
        Commands::Predict { model, input, threshold } => {
            cmd_predict(&config, model.as_deref(), &input, threshold)
        }
        Commands::Info { model } => cmd_info(&config, model.as_deref()),
    }
}
