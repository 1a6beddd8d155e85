//! Motivate CLI
//!
//! Thin launcher over [`motivate_core::PreferenceEngine`] for inspecting and
//! driving the learning state on disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use motivate_core::{
    Feedback, FeedbackEvent, ImpactLevel, OceanVector, PipelineStatus, PreferenceEngine, Settings,
    TrainOptions, TrainingOutcome,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "motivate")]
#[command(about = "OCEAN preference learning engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (default: <data dir>/motivate.toml if present)
    #[arg(short, long, env = "MOTIVATE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides data.dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show feedback, pair and model statistics
    Stats,

    /// Convert new feedback into preference pairs and retrain
    Train {
        /// Minimum feedback entries required
        #[arg(long)]
        min_feedback: Option<usize>,

        /// Only synthesize pairs, skip retraining
        #[arg(long)]
        no_train: bool,
    },

    /// Show or reset the learned profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Record feedback on a response
    Feedback {
        /// The user's message
        #[arg(short, long)]
        prompt: String,

        /// The response that was shown
        #[arg(short, long)]
        response: String,

        /// OCEAN values the response was generated with: O,C,E,A,N
        #[arg(short, long, value_parser = parse_ocean)]
        ocean: OceanVector,

        #[arg(short, long, value_enum)]
        verdict: Verdict,
    },

    /// Score responses with the reward model (best first)
    Score {
        /// Candidate responses
        #[arg(required = true)]
        texts: Vec<String>,

        /// Profile to score for (default: the learned profile)
        #[arg(short, long, value_parser = parse_ocean)]
        ocean: Option<OceanVector>,
    },

    /// Print the learning-rate schedule
    Schedule {
        /// Feedback counts to show
        #[arg(long, value_delimiter = ',', default_value = "0,5,10,20,30,50,75,100")]
        counts: Vec<u64>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verdict {
    Up,
    Down,
}

fn parse_ocean(s: &str) -> std::result::Result<OceanVector, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<std::result::Result<_, _>>()?;
    let values: [f64; 5] = values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected 5 comma-separated values, got {}", v.len()))?;
    OceanVector::from_array(values).map_err(|e| e.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("motivate={0},motivate_core={0}", cli.log_level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Motivate v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        settings.data.dir = dir;
    }

    if let Commands::Config = cli.command {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }
    if let Commands::Schedule { counts } = &cli.command {
        println!("{:>8}  {:>8}  impact", "count", "rate");
        for &count in counts {
            let rate = settings.learning.rate(count);
            println!("{:>8}  {:>8.4}  {}", count, rate, ImpactLevel::from_rate(rate));
        }
        return Ok(());
    }

    let engine = PreferenceEngine::from_settings(&settings)
        .await
        .context("Failed to initialize engine")?;

    match cli.command {
        Commands::Stats => {
            let stats = engine.stats().await?;
            if cli.json {
                return print_json(&stats);
            }
            println!(
                "Feedback:  {} ({} positive, {} negative)",
                stats.total_feedback, stats.positive_feedback, stats.negative_feedback
            );
            println!(
                "Pairs:     {} ({} from feedback)",
                stats.total_pairs, stats.feedback_pairs
            );
            println!("Processed: {} ledger entries", stats.cursor);
            match stats.model_id {
                Some(id) => println!("Model:     trained ({})", id),
                None => println!("Model:     not trained"),
            }
        }
        Commands::Train {
            min_feedback,
            no_train,
        } => {
            let report = engine
                .train_from_feedback(TrainOptions {
                    min_feedback,
                    skip_training: no_train,
                })
                .await?;
            if cli.json {
                return print_json(&report);
            }
            match report.status {
                PipelineStatus::InsufficientData => println!(
                    "Need at least {} feedback entries, have {}",
                    report.min_feedback, report.total_feedback
                ),
                PipelineStatus::NoNewData => println!("No new feedback to process"),
                PipelineStatus::Success => {
                    println!(
                        "Processed {} feedback entries into {} pairs ({} placeholders)",
                        report.processed, report.new_pairs, report.placeholders_used
                    );
                    match report.training {
                        Some(TrainingOutcome::Trained {
                            model_id,
                            pair_count,
                            training_accuracy,
                            ..
                        }) => println!(
                            "Trained model {} on {} pairs (accuracy {:.2})",
                            model_id, pair_count, training_accuracy
                        ),
                        Some(TrainingOutcome::Failed { message }) => {
                            println!("Training failed: {}", message)
                        }
                        None => println!("Training skipped"),
                    }
                }
            }
        }
        Commands::Profile { action } => {
            let profile = match action {
                ProfileAction::Show => engine.profile().await?,
                ProfileAction::Reset => engine.reset_profile().await?,
            };
            if cli.json {
                return print_json(&profile);
            }
            println!("{}", profile.current);
            println!("feedback count: {}", profile.feedback_count);
            let next_rate = engine.updater().schedule().rate(profile.feedback_count);
            println!(
                "next learning rate: {:.4} ({})",
                next_rate,
                ImpactLevel::from_rate(next_rate)
            );
        }
        Commands::Feedback {
            prompt,
            response,
            ocean,
            verdict,
        } => {
            let feedback = match verdict {
                Verdict::Up => Feedback::Positive,
                Verdict::Down => Feedback::Negative,
            };
            let event = FeedbackEvent::new(prompt, response, ocean, feedback)?;
            let receipt = engine.record_feedback(event).await?;
            if cli.json {
                return print_json(&receipt);
            }
            println!(
                "Recorded {} feedback #{} at rate {:.4} ({} impact)",
                feedback, receipt.profile.feedback_count, receipt.learning_rate, receipt.impact
            );
            println!("Profile: {}", receipt.profile.current);
            if let Some(report) = receipt.auto_training {
                println!("Auto-training: {:?}", report.status);
            }
        }
        Commands::Score { texts, ocean } => {
            let profile = match ocean {
                Some(profile) => profile,
                None => engine.profile().await?.current,
            };
            if !engine.scorer().slot().is_trained().await {
                eprintln!("No reward model yet; scores are neutral");
            }
            let ranked = engine.rerank(&texts, &profile).await?;
            if cli.json {
                return print_json(&ranked);
            }
            for entry in ranked {
                println!("{:.3}  {}", entry.score, entry.text);
            }
        }
        Commands::Schedule { .. } | Commands::Config => {}
    }

    Ok(())
}
