//! av-sync - report the offset between two recordings of the same event
//!
//! Usage:
//!   av-sync <file1> <file2>
//!
//! Example:
//!   av-sync good_video_bad_audio.mp4 good_audio_bad_video.mp4
//!
//!   good_audio_bad_video.mp4 needs to be truncated by 11.3478 seconds

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use av_sync::{
    align_files, AlignConfig, FfmpegSource, NativeSource, SyncError, TieBreak, WaveformSource,
};
use clap::{ArgAction, CommandFactory, Parser, ValueEnum};

#[derive(Parser)]
#[command(
    name = "av-sync",
    version,
    about = "Report how much to cut from the start of one recording to sync it with another",
    long_about = "Extracts the audio of both files, fingerprints them and reports which file \
                  must be truncated, and by how many seconds, for the two to be in sync."
)]
struct Cli {
    /// Reference recording (audio or video)
    file1: PathBuf,

    /// Recording to compare against the reference
    file2: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Samples per analysis frame
    #[arg(long)]
    frame_size: Option<usize>,

    /// Samples shared by consecutive frames
    #[arg(long)]
    overlap: Option<usize>,

    /// Frequency bins per landmark cell
    #[arg(long)]
    box_height: Option<usize>,

    /// Frames per landmark cell
    #[arg(long)]
    box_width: Option<usize>,

    /// Landmarks kept per cell
    #[arg(long)]
    landmarks_per_cell: Option<usize>,

    /// Seconds of the reference analyzed
    #[arg(long)]
    reference_limit: Option<f64>,

    /// Seconds of the compared file analyzed
    #[arg(long)]
    sample_limit: Option<f64>,

    /// Analyze both recordings in full
    #[arg(long, conflicts_with_all = ["reference_limit", "sample_limit"])]
    no_limit: bool,

    /// Rule for choosing between equally voted delays
    #[arg(long, value_enum)]
    tie_break: Option<TieBreakArg>,

    /// Extraction program (ffmpeg-compatible)
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Decode audio in-process instead of running the extraction program
    #[arg(long)]
    native: bool,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum TieBreakArg {
    /// Smallest absolute delay
    Smallest,
    /// Smallest delay value
    Earliest,
    /// Largest delay value
    Latest,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Smallest => TieBreak::SmallestMagnitude,
            TieBreakArg::Earliest => TieBreak::Earliest,
            TieBreakArg::Latest => TieBreak::Latest,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report_failure(&err)),
    }
}

/// Print `err` and return the process exit status: 2 with usage for a
/// missing input, 1 for anything else.
fn report_failure(err: &anyhow::Error) -> u8 {
    if let Some(SyncError::MissingInput(path)) = err.downcast_ref::<SyncError>() {
        eprintln!("** {} does not exist **\n", path.display());
        eprintln!("{}", Cli::command().render_usage());
        return 2;
    }
    eprintln!("error: {:#}", err);
    1
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    log::debug!("{:?}", config);

    let source: Box<dyn WaveformSource> = if cli.native {
        Box::new(NativeSource)
    } else {
        Box::new(FfmpegSource::new(config.extraction.clone()))
    };

    let file1 = absolute(&cli.file1);
    let file2 = absolute(&cli.file2);

    let report = align_files(&file1, &file2, &*source, &config).with_context(|| {
        format!("comparing {} and {}", file1.display(), file2.display())
    })?;

    if cli.json {
        println!("{}", report.to_json());
    } else if cli.verbose > 0 {
        println!("{}", report.detailed_report());
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<AlignConfig> {
    let mut config = match &cli.config {
        Some(path) => AlignConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AlignConfig::default(),
    };

    if let Some(v) = cli.frame_size {
        config.frame_size = v;
    }
    if let Some(v) = cli.overlap {
        config.overlap = v;
    }
    if let Some(v) = cli.box_height {
        config.box_height = v;
    }
    if let Some(v) = cli.box_width {
        config.box_width = v;
    }
    if let Some(v) = cli.landmarks_per_cell {
        config.landmarks_per_cell = v;
    }
    if cli.no_limit {
        config.reference_limit_secs = None;
        config.sample_limit_secs = None;
    }
    if let Some(v) = cli.reference_limit {
        config.reference_limit_secs = Some(v);
    }
    if let Some(v) = cli.sample_limit {
        config.sample_limit_secs = Some(v);
    }
    if let Some(v) = cli.tie_break {
        config.tie_break = v.into();
    }
    if let Some(program) = &cli.ffmpeg {
        config.extraction.program = program.clone();
    }

    config.validate()?;
    Ok(config)
}

fn absolute(path: &std::path::Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_exactly_two_files() {
        assert!(Cli::try_parse_from(["av-sync", "a.mp4"]).is_err());
        assert!(Cli::try_parse_from(["av-sync", "a.mp4", "b.mp4", "c.mp4"]).is_err());
        assert!(Cli::try_parse_from(["av-sync", "a.mp4", "b.mp4"]).is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "av-sync",
            "a.mp4",
            "b.mp4",
            "--frame-size",
            "2048",
            "--overlap",
            "1024",
            "--tie-break",
            "latest",
            "--ffmpeg",
            "avconv",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.frame_size, 2048);
        assert_eq!(config.overlap, 1024);
        assert_eq!(config.tie_break, TieBreak::Latest);
        assert_eq!(config.extraction.program, "avconv");
        assert_eq!(config.reference_limit_secs, Some(120.0));
    }

    #[test]
    fn test_no_limit() {
        let cli = Cli::try_parse_from(["av-sync", "a.mp4", "b.mp4", "--no-limit"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.reference_limit_secs, None);
        assert_eq!(config.sample_limit_secs, None);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli =
            Cli::try_parse_from(["av-sync", "a.mp4", "b.mp4", "--overlap", "1024"]).unwrap();
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_missing_input_exits_with_usage_status() {
        let err = anyhow::Error::new(SyncError::MissingInput(PathBuf::from("gone.mp4")))
            .context("comparing gone.mp4 and b.mp4");
        assert_eq!(report_failure(&err), 2);
    }

    #[test]
    fn test_other_failures_exit_with_one() {
        let err = anyhow::Error::new(SyncError::NoOverlap).context("comparing a.mp4 and b.mp4");
        assert_eq!(report_failure(&err), 1);
        assert_eq!(report_failure(&anyhow::anyhow!("bad config")), 1);
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
