//! CLI interface for humanloop

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::App;
use crate::config::{self, Config};
use crate::feedback::{FeedbackRecord, FeedbackSummary};
use crate::orchestrator::RunReport;
use crate::types::Label;

#[derive(Parser)]
#[command(name = "humanloop")]
#[command(about = "Human-in-the-loop text classification with versioned models", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config path)
    #[arg(long, global = true, env = "HUMANLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true, env = "HUMANLOOP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on the base corpus only
    Baseline,
    /// Retrain on the base corpus plus all feedback
    Retrain {
        /// Weight of feedback examples (defaults to the configured weight)
        #[arg(short = 'w', long)]
        feedback_weight: Option<f64>,
        /// Make the new version current
        #[arg(long)]
        promote: bool,
    },
    /// Classify a text
    Predict {
        text: String,
        /// Model version (defaults to current)
        #[arg(short, long)]
        version: Option<u32>,
    },
    /// Record a human correction
    Feedback {
        text: String,
        /// Label the model predicted
        #[arg(short, long)]
        predicted: String,
        /// Correct label
        #[arg(short, long)]
        label: String,
    },
    /// Make a version current
    Promote { version: u32 },
    /// List model versions
    Versions,
    /// Show the metrics report of a version
    Metrics {
        #[arg(short, long)]
        version: Option<u32>,
    },
    /// Compare versions side by side
    Compare {
        #[arg(required = true)]
        versions: Vec<u32>,
    },
    /// Summarize the feedback log
    FeedbackStats,
    /// Start the HTTP server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
        /// Print the config file location
        #[arg(long)]
        path: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_file = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    let mut config = Config::load_from(&config_file)?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }

    if let Commands::Config { show, path } = &cli.command {
        if *path || !*show {
            println!("{}", config_file.display());
        }
        if *show {
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
        }
        return Ok(());
    }

    let app = Arc::new(App::open(&config)?);

    match cli.command {
        Commands::Baseline => {
            let report = run_with_spinner("Training baseline model", {
                let app = Arc::clone(&app);
                move || app.orchestrator.run_baseline()
            })
            .await?;
            print_report(&report);
        }
        Commands::Retrain {
            feedback_weight,
            promote,
        } => {
            let report = run_with_spinner("Retraining with feedback", {
                let app = Arc::clone(&app);
                move || app.orchestrator.retrain(feedback_weight)
            })
            .await?;
            print_report(&report);
            if promote && !report.promoted {
                app.registry.set_current(report.version)?;
                println!("✓ v{} is now current", report.version);
            }
        }
        Commands::Predict { text, version } => {
            let prediction = app.predictor.predict_with_version(&text, version)?;
            println!(
                "{} ({:.1}% confidence, model v{})",
                prediction.label,
                prediction.confidence * 100.0,
                prediction.version
            );
        }
        Commands::Feedback {
            text,
            predicted,
            label,
        } => {
            let model_prediction: Label = predicted.parse()?;
            let human_label: Label = label.parse()?;
            let model_version = app.registry.current_version()?.unwrap_or(0);
            let record = FeedbackRecord::new(text, model_prediction, human_label, model_version);
            app.feedback.append(&record)?;
            println!(
                "✓ Feedback recorded at {} ({} -> {})",
                record.timestamp.to_rfc3339(),
                model_prediction,
                human_label
            );
        }
        Commands::Promote { version } => {
            app.registry.set_current(version)?;
            println!("✓ v{} is now current", version);
        }
        Commands::Versions => {
            let versions = app.registry.versions()?;
            if versions.is_empty() {
                println!("No model versions yet. Run 'humanloop baseline' first.");
                return Ok(());
            }
            let current = app.registry.current_version()?;
            println!("{:<3} {:<8} {:>9} {:>9}  {}", "", "VERSION", "ACCURACY", "F1 MACRO", "CREATED");
            for v in versions {
                let model = app.registry.get(Some(v))?;
                let marker = if current == Some(v) { "*" } else { "" };
                println!(
                    "{:<3} {:<8} {:>9.4} {:>9.4}  {}",
                    marker,
                    format!("v{}", v),
                    model.metrics.accuracy,
                    model.metrics.f1_macro,
                    model.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Metrics { version } => {
            let model = app.registry.get(version)?;
            println!("Model v{}", model.version);
            println!(
                "{}",
                serde_json::to_string_pretty(&model.metrics).context("Failed to render metrics")?
            );
        }
        Commands::Compare { versions } => {
            let rows = app.registry.compare(&versions)?;
            println!("{:<8} {:>9} {:>9} {:>11}", "VERSION", "ACCURACY", "F1 MACRO", "F1 WEIGHTED");
            for row in rows {
                println!(
                    "{:<8} {:>9.4} {:>9.4} {:>11.4}",
                    format!("v{}", row.version),
                    row.accuracy,
                    row.f1_macro,
                    row.f1_weighted
                );
            }
        }
        Commands::FeedbackStats => {
            let records = app.feedback.load_all()?;
            let summary = FeedbackSummary::from_records(&records);
            println!("Feedback records: {}", summary.total);
            println!("Corrections:      {}", summary.corrections);
            for (label, count) in &summary.by_human_label {
                println!("  {:<10} {}", label.as_str(), count);
            }
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            crate::server::start(app, &host, port).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Run a blocking training job while a spinner ticks
async fn run_with_spinner<F>(message: &str, job: F) -> Result<RunReport>
where
    F: FnOnce() -> crate::error::Result<RunReport> + Send + 'static,
{
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("{}...", message));
    pb.enable_steady_tick(Duration::from_millis(80));

    let result = tokio::task::spawn_blocking(job).await;
    pb.finish_and_clear();

    let report = result.context("Training task panicked")??;
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!("✓ Committed model v{} (run {})", report.version, report.run_id);
    println!(
        "  Examples: {} base, {} feedback ({} corrections), {} held out",
        report.counts.base, report.counts.feedback, report.counts.corrections, report.counts.held_out
    );
    println!("  Accuracy:        {:.4}", report.metrics.accuracy);
    println!("  F1 (macro):      {:.4}", report.metrics.f1_macro);
    println!("  F1 (weighted):   {:.4}", report.metrics.f1_weighted);
    if let Some(delta) = &report.delta_vs_baseline {
        println!(
            "  Improvement over v1: accuracy {:+.4}, F1 (macro) {:+.4}",
            delta.accuracy, delta.f1_macro
        );
    }
    if report.promoted {
        println!("  Now serving v{}", report.version);
    } else {
        println!("  Not promoted; run 'humanloop promote {}' to serve it", report.version);
    }
}
