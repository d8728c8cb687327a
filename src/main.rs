use clap::{Parser, Subcommand};
use piano2score::{analysis, validate_input, CancellationToken, Config, Transcriber};
use serde::Serialize;
use std::path::PathBuf;

/// Piano-to-Score Transcription System
#[derive(Parser)]
#[command(name = "piano2score")]
#[command(about = "Transcribe short piano recordings into a two-voice score")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio file
    Transcribe {
        /// Input audio file (WAV)
        input: PathBuf,

        /// JSON file receiving the transcription and measure layout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tempo used to convert seconds to beats
        #[arg(long)]
        bpm: Option<f32>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

#[derive(Serialize)]
struct TranscriptionReport<'a> {
    transcription: &'a piano2score::Transcription,
    score: &'a piano2score::ScoreLayout,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            config,
            bpm,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            // Load configuration
            let mut config = if let Some(config_path) = config {
                piano2score::config::load_config(config_path)?
            } else {
                Config::default()
            };
            if let Some(bpm) = bpm {
                config.score.tempo_bpm = bpm;
            }

            validate_input(&input, &config)?;
            let transcriber = Transcriber::new(config)?;

            log::info!("Processing {}...", input.display());
            let transcription = transcriber.transcribe_file(&input, &CancellationToken::new())?;
            let score = transcriber.assemble_score(&transcription);

            if !quiet {
                println!(
                    "{} treble / {} bass notes, key {}, {} measures",
                    transcription.treble.len(),
                    transcription.bass.len(),
                    transcription.key_signature.name(),
                    score.treble.measures.len()
                );
                for note in transcription.all_notes() {
                    println!(
                        "  {:>7.3}s  {:<6} {:<4} {} beats",
                        note.onset_sec,
                        note.voice.name(),
                        note.pitch.name(),
                        note.duration_beats.unwrap_or_default()
                    );
                }
            }

            if let Some(output) = output {
                let report = TranscriptionReport {
                    transcription: &transcription,
                    score: &score,
                };
                analysis::export_analysis(&report, &output)?;
                if !quiet {
                    println!("Results saved to {}", output.display());
                }
            }
        }
        Commands::ValidateConfig { config } => {
            let config = piano2score::config::load_config(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                println!("{}", json);
            }
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
