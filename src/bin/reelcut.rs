use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reelcut::{
    BatchReport, BatchRunner, Deadline, DirectoryPublisher, FfmpegLogLevel, MediaFile,
    OperationType, ProgressCallback, ProgressInfo, RenderConfig, RenderOutcome, RenderPipeline,
    ScoringConfig, ScoringMode, SegmentScorer, Window, select_best_window,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  reelcut batch videos_descargados --output videos_editados --logo logo.png\n  reelcut render match.mp4 --output videos_editados --logo logo.png --keep-sources\n  reelcut score match.mp4 --json\n  reelcut completions zsh > _reelcut";

#[derive(Debug, Parser)]
#[command(
    name = "reelcut",
    version,
    about = "Cut the liveliest minute of each video into a vertical clip",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Args, Clone)]
struct RenderArgs {
    /// Directory receiving the rendered clips.
    #[arg(long, default_value = "videos_editados")]
    output: PathBuf,

    /// Logo image overlaid on every clip.
    #[arg(long, default_value = "logo.png")]
    logo: PathBuf,

    /// Keep source files after a successful render.
    #[arg(long)]
    keep_sources: bool,

    /// Abort a file after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Clip length in seconds.
    #[arg(long, default_value_t = 60)]
    target_duration: u64,

    /// Decode every candidate window separately instead of one pass.
    #[arg(long)]
    per_window: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render every video in a directory.
    Batch {
        /// Directory holding the source videos.
        input_dir: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        /// Copy each rendered clip into this directory.
        #[arg(long)]
        publish_dir: Option<PathBuf>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Render a single video.
    Render {
        /// Source video.
        input: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Score the candidate windows of a video without rendering.
    Score {
        /// Source video.
        input: PathBuf,

        /// Clip length in seconds.
        #[arg(long, default_value_t = 60)]
        target_duration: u64,

        /// Decode every candidate window separately instead of one pass.
        #[arg(long)]
        per_window: bool,

        /// Print every candidate as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn scoring_mode(per_window: bool) -> ScoringMode {
    if per_window {
        ScoringMode::PerWindow
    } else {
        ScoringMode::SinglePass
    }
}

fn format_window(window: &Window) -> String {
    format!(
        "{:.1}s..{:.1}s",
        window.start.as_secs_f64(),
        window.end.as_secs_f64()
    )
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let ffmpeg_level = match &global.log_level {
        Some(level) => {
            Some(parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?)
        }
        None => None,
    };

    let filter = if global.verbose {
        log::LevelFilter::Debug
    } else {
        ffmpeg_level.map_or(log::LevelFilter::Info, FfmpegLogLevel::as_log_filter)
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .init();

    reelcut::set_ffmpeg_log_level(ffmpeg_level.unwrap_or(FfmpegLogLevel::Error));
    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} files {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        match info.operation {
            OperationType::Batch => {
                if let Some(total) = info.total {
                    self.bar.set_length(total);
                }
                self.bar.set_position(info.current);
            }
            OperationType::Scoring => {
                self.bar
                    .set_message(format!("scoring {:.0}%", info.percentage.unwrap_or(0.0)));
            }
            _ => {
                self.bar
                    .set_message(format!("rendering {:.0}%", info.percentage.unwrap_or(0.0)));
            }
        }
    }
}

fn build_pipeline(
    args: &RenderArgs,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> RenderPipeline {
    let mut config = RenderConfig::new(&args.output, &args.logo)
        .with_target_duration(Duration::from_secs(args.target_duration))
        .with_scoring_mode(scoring_mode(args.per_window))
        .with_delete_source(!args.keep_sources)
        .with_timeout(args.timeout.map(Duration::from_secs));
    if let Some(callback) = progress {
        config = config.with_progress(callback);
    }
    RenderPipeline::new(config)
}

fn outcome_json(outcome: &RenderOutcome) -> serde_json::Value {
    match outcome {
        RenderOutcome::Rendered {
            source,
            output,
            window,
        } => json!({
            "source": source.display().to_string(),
            "status": "rendered",
            "output": output.display().to_string(),
            "window": [window.start.as_secs_f64(), window.end.as_secs_f64()],
        }),
        RenderOutcome::Failed {
            source,
            stage,
            error,
        } => json!({
            "source": source.display().to_string(),
            "status": "failed",
            "stage": stage.to_string(),
            "error": error.to_string(),
        }),
    }
}

fn print_outcome(outcome: &RenderOutcome) {
    match outcome {
        RenderOutcome::Rendered { output, window, .. } => println!(
            "{} {} ({})",
            "saved".green().bold(),
            output.display(),
            format_window(window)
        ),
        RenderOutcome::Failed {
            source,
            stage,
            error,
        } => eprintln!(
            "{} {} after {stage}: {error}",
            "failed:".red().bold(),
            source.display()
        ),
    }
}

fn print_report(report: &BatchReport, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json_output {
        let payload = json!({
            "rendered": report.rendered(),
            "failed": report.failed(),
            "files": report.outcomes.iter().map(outcome_json).collect::<Vec<_>>(),
            "published": report.published.iter().map(|record| json!({
                "output": record.output.display().to_string(),
                "id": record.result.as_ref().ok(),
                "error": record.result.as_ref().err().map(ToString::to_string),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }
    for record in &report.published {
        match &record.result {
            Ok(id) => println!("{} {}", "published".cyan().bold(), id),
            Err(error) => eprintln!(
                "{} {}: {error}",
                "warning:".yellow().bold(),
                record.output.display()
            ),
        }
    }
    println!(
        "{} rendered, {} failed",
        report.rendered().to_string().green().bold(),
        report.failed().to_string().red().bold()
    );
    Ok(())
}

fn score_file(
    input: &Path,
    target_duration: u64,
    per_window: bool,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut media = MediaFile::open(input)?;
    let config = ScoringConfig {
        target_duration: Duration::from_secs(target_duration),
        mode: scoring_mode(per_window),
        ..ScoringConfig::default()
    };
    let scorer = SegmentScorer::new(config);
    let candidates = scorer.score_candidates(&mut media, &Deadline::unbounded())?;
    let best = if media.metadata().duration <= scorer.config().target_duration {
        Window::new(Duration::ZERO, media.metadata().duration)
    } else {
        select_best_window(&candidates, scorer.config().target_duration)
    };

    if json_output {
        let payload = json!({
            "source": input.display().to_string(),
            "duration_seconds": media.metadata().duration_seconds(),
            "best": [best.start.as_secs_f64(), best.end.as_secs_f64()],
            "candidates": candidates.iter().map(|candidate| json!({
                "start": candidate.window.start.as_secs_f64(),
                "end": candidate.window.end.as_secs_f64(),
                "audio_energy": candidate.audio_energy,
                "motion_energy": candidate.motion_energy,
                "score": candidate.score,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for candidate in &candidates {
        let line = format!(
            "{:>16}  audio {:>10.2}  motion {:>14.0}  score {:>14.2}",
            format_window(&candidate.window),
            candidate.audio_energy,
            candidate.motion_energy,
            candidate.score
        );
        if candidate.window == best {
            println!("{}", line.green().bold());
        } else {
            println!("{line}");
        }
    }
    println!("{} {}", "best".green().bold(), format_window(&best));
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    let terminal = if cli.global.progress {
        Some(Arc::new(TerminalProgress::new()?))
    } else {
        None
    };
    let callback = terminal
        .clone()
        .map(|progress| progress as Arc<dyn ProgressCallback>);

    match cli.command {
        Commands::Batch {
            input_dir,
            render,
            publish_dir,
            json,
        } => {
            let mut runner = BatchRunner::new(build_pipeline(&render, callback.clone()));
            if let Some(directory) = publish_dir {
                runner = runner.with_publisher(Box::new(DirectoryPublisher::new(directory)));
            }
            if let Some(callback) = callback {
                runner = runner.with_progress(callback);
            }
            let report = runner.run(&input_dir)?;
            if let Some(progress) = &terminal {
                progress.finish();
            }
            print_report(&report, json)?;
        }
        Commands::Render {
            input,
            render,
            json,
        } => {
            let outcome = build_pipeline(&render, callback).process(&input);
            if let Some(progress) = &terminal {
                progress.finish();
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
            } else {
                print_outcome(&outcome);
            }
            if let RenderOutcome::Failed { error, .. } = outcome {
                return Err(error.into());
            }
        }
        Commands::Score {
            input,
            target_duration,
            per_window,
            json,
        } => score_file(&input, target_duration, per_window, json)?,
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reelcut", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, parse_log_level, scoring_mode};
    use clap::CommandFactory;
    use reelcut::{FfmpegLogLevel, ScoringMode};

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("warn"), Some(FfmpegLogLevel::Warning));
        assert_eq!(parse_log_level("Quiet"), Some(FfmpegLogLevel::Quiet));
        assert!(parse_log_level("shout").is_none());
    }

    #[test]
    fn scoring_mode_flag() {
        assert_eq!(scoring_mode(false), ScoringMode::SinglePass);
        assert_eq!(scoring_mode(true), ScoringMode::PerWindow);
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
