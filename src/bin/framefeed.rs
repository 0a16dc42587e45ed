use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framefeed::{
    ClipSet, ClipSource, FfmpegLogLevel, FolderDataset, FrameDecoder, FrameWindow, LabelCatalog,
    LabeledSequenceBatcher,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Metadata, Record};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framefeed probe sportclip_0.mp4 --json\n  framefeed extract sportclip_0.mp4 --output frames --start 0 --count 10\n  framefeed batches video_data/training --clips 100 --json\n  framefeed split frames --seed 0 --percentage 90\n  framefeed labels sportclip_0.txt --frames 10\n  framefeed completions zsh > _framefeed";

/// Research dataset defaults.
const DEFAULT_TARGET: u32 = 168;
const DEFAULT_FRAME_COUNT: u64 = 10;
const DEFAULT_BATCH_SIZE: usize = 16;
const DEFAULT_CATEGORIES: usize = 11;
const DEFAULT_SPLIT_PERCENTAGE: u32 = 90;

#[derive(Debug, Parser)]
#[command(
    name = "framefeed",
    version,
    about = "Turn labeled video clips into numeric frame tensors",
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

    /// Suppress progress bars.
    #[arg(long)]
    no_progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    ffmpeg_log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a clip's video metadata.
    #[command(
        about = "Print clip metadata",
        visible_alias = "info",
        after_help = "Examples:\n  framefeed probe sportclip_0.mp4\n  framefeed probe sportclip_0.mp4 --json"
    )]
    Probe {
        /// Input clip path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode a frame window and write the frames as images.
    #[command(
        about = "Extract a frame window to images",
        after_help = "Examples:\n  framefeed extract sportclip_0.mp4 --output frames\n  framefeed extract sportclip_0.mp4 --output frames --start 5 --count 20 --format bmp"
    )]
    Extract {
        /// Input clip path.
        input: PathBuf,
        /// Output directory for frame images.
        #[arg(long)]
        output: PathBuf,
        /// First frame to decode.
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Number of consecutive frames.
        #[arg(long, default_value_t = DEFAULT_FRAME_COUNT)]
        count: u64,
        /// Output height in pixels.
        #[arg(long, default_value_t = DEFAULT_TARGET)]
        rows: u32,
        /// Output width in pixels.
        #[arg(long, default_value_t = DEFAULT_TARGET)]
        columns: u32,
        /// Output image format (png, bmp).
        #[arg(long, default_value = "png")]
        format: String,
    },

    /// Dry-run batch assembly over a numbered clip set.
    #[command(
        about = "Dry-run labeled batch assembly",
        after_help = "Examples:\n  framefeed batches video_data/training --clips 100\n  framefeed batches video_data/training --pattern sportclip_{} --clips 100 --batch-size 16 --json"
    )]
    Batches {
        /// Directory holding the numbered clip/label pairs.
        directory: PathBuf,
        /// File-stem pattern with a {} index placeholder.
        #[arg(long, default_value = framefeed::DEFAULT_CLIP_PATTERN)]
        pattern: String,
        /// First clip index.
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Number of clips.
        #[arg(long)]
        clips: u64,
        /// First frame of each clip's window.
        #[arg(long, default_value_t = 0)]
        start_frame: u64,
        /// Frames per clip.
        #[arg(long, default_value_t = DEFAULT_FRAME_COUNT)]
        frames: u64,
        /// Output height in pixels.
        #[arg(long, default_value_t = DEFAULT_TARGET)]
        rows: u32,
        /// Output width in pixels.
        #[arg(long, default_value_t = DEFAULT_TARGET)]
        columns: u32,
        /// Rows per mini-batch.
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Number of categories for one-hot encoding.
        #[arg(long, default_value_t = DEFAULT_CATEGORIES)]
        categories: usize,
        /// Output the summary as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Preview a deterministic balanced split of an image folder tree.
    #[command(
        about = "Preview a balanced image-folder split",
        after_help = "Examples:\n  framefeed split frames --seed 0 --percentage 90\n  framefeed split frames --extensions bmp,jpg --labels cats,dogs --json"
    )]
    Split {
        /// Root of the category-per-subdirectory tree.
        root: PathBuf,
        /// Allowed file extensions, comma separated.
        #[arg(long, default_value = "bmp")]
        extensions: String,
        /// Shuffle seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Percentage of each category in the first group.
        #[arg(long, default_value_t = DEFAULT_SPLIT_PERCENTAGE)]
        percentage: u32,
        /// Comma-separated category names; defaults to the sports catalog.
        #[arg(long)]
        labels: Option<String>,
        /// Output the preview as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a per-clip label file.
    #[command(
        about = "Validate a label file",
        after_help = "Examples:\n  framefeed labels sportclip_0.txt --frames 10\n  framefeed labels sportclip_0.txt --frames 10 --categories 11"
    )]
    Labels {
        /// Label file path.
        file: PathBuf,
        /// Frame count the file must describe.
        #[arg(long)]
        frames: u64,
        /// Number of categories every label must fall under.
        #[arg(long, default_value_t = DEFAULT_CATEGORIES)]
        categories: usize,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Minimal stderr logger wired to --verbose.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level = match record.level() {
                Level::Error => "error".red().bold(),
                Level::Warn => "warn".yellow().bold(),
                _ => record.level().as_str().to_ascii_lowercase().normal(),
            };
            eprintln!("{level} {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn make_progress_bar(total: u64, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .expect("static template"),
    );
    bar.set_message(message);
    bar
}

fn parse_ffmpeg_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|extension| extension.trim().trim_start_matches('.').to_string())
        .filter(|extension| !extension.is_empty())
        .collect()
}

fn parse_image_format(value: &str) -> Option<&'static str> {
    match value.to_ascii_lowercase().as_str() {
        "png" => Some("png"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if cli.global.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    if let Some(level) = &cli.global.ffmpeg_log_level {
        let level =
            parse_ffmpeg_log_level(level).ok_or("Unsupported --ffmpeg-log-level value")?;
        framefeed::set_ffmpeg_log_level(level);
    } else {
        framefeed::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }

    match cli.command {
        Commands::Probe { input, json } => {
            let metadata = FrameDecoder::probe(&ClipSource::path(&input))?;
            if json {
                let payload = json!({
                    "path": input,
                    "width": metadata.width,
                    "height": metadata.height,
                    "frames_per_second": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "codec": metadata.codec,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", input.display());
                println!("  codec:      {}", metadata.codec);
                println!("  resolution: {}x{}", metadata.width, metadata.height);
                println!("  frame rate: {:.3} fps", metadata.frames_per_second);
                println!("  frames:     ~{}", metadata.frame_count);
                println!("  duration:   {:.3}s", metadata.duration.as_secs_f64());
            }
        }
        Commands::Extract {
            input,
            output,
            start,
            count,
            rows,
            columns,
            format,
        } => {
            let extension = parse_image_format(&format).ok_or("Unsupported --format (png|bmp)")?;
            std::fs::create_dir_all(&output)?;

            // Validate the window up front, then drive a decode session
            // directly: the export path wants pixels, not flattened tensors.
            FrameWindow::frames(start, count)
                .with_target_size(rows, columns)
                .validate()?;

            let bar = (!cli.global.no_progress).then(|| make_progress_bar(count, "extracting"));

            let source = ClipSource::path(&input);
            let dimensions = (columns, rows);
            let mut session = FrameDecoder::open(&source, dimensions)?;
            session.seek_to(start)?;

            let mut written = 0u64;
            let mut skipped = 0u64;
            for frame_number in start..start + count {
                // Same retry discipline as the extractor: one direct-access
                // attempt before the frame is reported as skipped.
                let picture = match session.next_frame() {
                    Ok(Some(picture)) => Some(picture),
                    Ok(None) | Err(_) => {
                        match FrameDecoder::frame_at(&source, frame_number, dimensions) {
                            Ok(picture) => Some(picture),
                            Err(error) => {
                                eprintln!(
                                    "{} frame {frame_number} skipped: {error}",
                                    "warning:".yellow().bold()
                                );
                                skipped += 1;
                                None
                            }
                        }
                    }
                };

                if let Some(picture) = picture {
                    let buffer = picture.to_bgr_buffer()?;
                    let image = image::RgbImage::from_raw(
                        buffer.width(),
                        buffer.height(),
                        buffer.to_rgb_bytes(),
                    )
                    .ok_or("converted buffer does not fill the target dimensions")?;
                    image.save(output.join(format!("frame_{frame_number}.{extension}")))?;
                    written += 1;
                }
                if let Some(bar) = &bar {
                    bar.set_position(written + skipped);
                }
            }
            if let Some(bar) = bar {
                bar.finish_with_message("done");
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Wrote {written} frame(s) to {}", output.display()).green()
            );
        }
        Commands::Batches {
            directory,
            pattern,
            start,
            clips,
            start_frame,
            frames,
            rows,
            columns,
            batch_size,
            categories,
            json,
        } => {
            let clip_set = ClipSet::new(&directory, &pattern, start, clips)?;
            let window = FrameWindow::frames(start_frame, frames).with_target_size(rows, columns);
            let mut batcher =
                LabeledSequenceBatcher::for_clip_set(clip_set, window, batch_size, categories)?;

            let bar = if cli.global.no_progress {
                None
            } else {
                Some(make_progress_bar(clips * frames, "batching"))
            };

            let mut batch_count = 0u64;
            let mut row_count = 0u64;
            let mut label_distribution = vec![0u64; categories];
            for batch in &mut batcher {
                let batch = batch?;
                batch_count += 1;
                row_count += batch.len() as u64;
                for row in 0..batch.len() {
                    if let Some(label) = batch.label_index(row) {
                        label_distribution[label] += 1;
                    }
                }
                if let Some(bar) = &bar {
                    bar.set_position(row_count);
                }
            }
            if let Some(bar) = bar {
                bar.finish_with_message("done");
            }

            if json {
                let payload = json!({
                    "directory": directory,
                    "clips": clips,
                    "batch_size": batch_size,
                    "batches": batch_count,
                    "rows": row_count,
                    "label_distribution": label_distribution,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("batches: {batch_count}");
                println!("rows:    {row_count}");
                println!("labels:  {label_distribution:?}");
            }
        }
        Commands::Split {
            root,
            extensions,
            seed,
            percentage,
            labels,
            json,
        } => {
            let catalog = match labels {
                Some(names) => LabelCatalog::new(names.split(',').map(str::trim))?,
                None => LabelCatalog::sports(),
            };
            let extensions = parse_extensions(&extensions);
            let extension_refs: Vec<&str> =
                extensions.iter().map(String::as_str).collect();

            let dataset = FolderDataset::scan(&root, &catalog, &extension_refs)?;
            let split = dataset.balanced_split(seed, percentage)?;

            let mut first_counts = vec![0u64; catalog.len()];
            let mut second_counts = vec![0u64; catalog.len()];
            for entry in &split.first {
                first_counts[entry.label] += 1;
            }
            for entry in &split.second {
                second_counts[entry.label] += 1;
            }

            if json {
                let categories: Vec<_> = catalog
                    .iter()
                    .enumerate()
                    .map(|(index, name)| {
                        json!({
                            "category": name,
                            "first": first_counts[index],
                            "second": second_counts[index],
                        })
                    })
                    .collect();
                let payload = json!({
                    "root": root,
                    "seed": seed,
                    "percentage": percentage,
                    "first_total": split.first.len(),
                    "second_total": split.second.len(),
                    "categories": categories,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "split of {} file(s): {} / {}",
                    dataset.len(),
                    split.first.len(),
                    split.second.len()
                );
                for (index, name) in catalog.iter().enumerate() {
                    println!(
                        "  {name:<20} {:>6} / {:>6}",
                        first_counts[index], second_counts[index]
                    );
                }
            }
        }
        Commands::Labels {
            file,
            frames,
            categories,
        } => {
            let labels = framefeed::read_clip_labels(&file, frames)?;
            for (line, &label) in labels.iter().enumerate() {
                if label >= categories {
                    return Err(format!(
                        "line {}: label {label} is out of range for {categories} categories",
                        line + 1
                    )
                    .into());
                }
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("{} label(s) valid for {frames} frame(s)", labels.len()).green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framefeed", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_extensions, parse_ffmpeg_log_level, parse_image_format};

    #[test]
    fn parse_ffmpeg_log_level_aliases() {
        assert!(parse_ffmpeg_log_level("quiet").is_some());
        assert!(parse_ffmpeg_log_level("WARN").is_some());
        assert!(parse_ffmpeg_log_level("warning").is_some());
        assert!(parse_ffmpeg_log_level("chatty").is_none());
    }

    #[test]
    fn parse_extensions_trims_and_drops_dots() {
        assert_eq!(parse_extensions("bmp"), vec!["bmp"]);
        assert_eq!(parse_extensions(".bmp, jpg ,"), vec!["bmp", "jpg"]);
        assert!(parse_extensions("").is_empty());
    }

    #[test]
    fn parse_image_format_known_values() {
        assert_eq!(parse_image_format("PNG"), Some("png"));
        assert_eq!(parse_image_format("bmp"), Some("bmp"));
        assert!(parse_image_format("tiff").is_none());
    }
}
