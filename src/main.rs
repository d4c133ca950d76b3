// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;
use tokio::task::JoinHandle;

use tubepull::analysis::CaptionTracks;
use tubepull::download::{COLLECTION_MAX_HEIGHT, parse_selection, truncate_title};
use tubepull::logging::{init_logger, log_path};
use tubepull::{
    AnalysisResult, BatchSummary, Config, ConfigError, Event, EventReceiver, MediaSelection,
    Session, UiState, YtDlp, event_channel,
};

// Emoji with fallback for terminals without Unicode support
static CLAPPER: Emoji<'_, '_> = Emoji("🎬 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static TV: Emoji<'_, '_> = Emoji("📺 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Consumer loop tick
const TICK: Duration = Duration::from_millis(100);

/// Download videos, audio and captions from YouTube
#[derive(Parser, Debug)]
#[command(name = "tubepull")]
#[command(about = "Download videos, audio and captions from YouTube")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Write a diagnostic log file
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show errors and the final result
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a URL and list its formats, captions or collection entries
    Analyze {
        url: String,

        /// Show caption tracks of this collection entry (1-based)
        #[arg(long)]
        entry: Option<usize>,
    },

    /// Download a single item or selected entries of a collection
    Download(DownloadArgs),

    /// Show the settings file
    Config {
        /// Write the current settings to the settings file
        #[arg(long)]
        init: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct DownloadArgs {
    url: String,

    /// Output directory (defaults to the configured download directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Format id of the rendition to download (defaults to the best one)
    #[arg(short, long, conflicts_with = "audio")]
    format: Option<String>,

    /// Download audio only, converted to MP3
    #[arg(short, long)]
    audio: bool,

    /// Caption language code or label
    #[arg(long)]
    captions: Option<String>,

    /// Collection entries to download, e.g. "1,3-5" or "all"
    #[arg(short, long, default_value = "all")]
    entries: String,

    /// Retries per item after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Seconds to wait between retries
    #[arg(long)]
    delay: Option<u64>,
}

/// Renders engine events to the terminal
struct Console {
    multi: MultiProgress,
    status_bar: ProgressBar,
    item_bar: Option<ProgressBar>,
    overall_bar: Option<ProgressBar>,
    quiet: bool,
}

impl Console {
    fn new(quiet: bool) -> Result<Self> {
        let multi = MultiProgress::new();

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {wide_msg}")
                .context("Invalid progress template")?,
        );

        Ok(Self {
            multi,
            status_bar,
            item_bar: None,
            overall_bar: None,
            quiet,
        })
    }

    /// Add the item and overall bars used during downloads
    fn with_download_bars(mut self, collection: bool) -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("  {prefix:>8} [{bar:30.cyan/blue}] {pos:>3}%")
            .context("Invalid progress template")?
            .progress_chars("█▓░");

        let item = self.multi.add(ProgressBar::new(100));
        item.set_style(style.clone());
        item.set_prefix(format!("{DOWNLOAD}item"));
        self.item_bar = Some(item);

        if collection {
            let overall = self.multi.add(ProgressBar::new(100));
            overall.set_style(style);
            overall.set_prefix("overall");
            self.overall_bar = Some(overall);
        }
        Ok(self)
    }

    fn print(&self, line: String) {
        self.multi.suspend(|| println!("{}", line));
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Log { level, message } => match level {
                Level::Error => self.print(format!("{FAILURE}{}", message.red())),
                Level::Warn => self.print(format!("{WARNING}{}", message.yellow())),
                _ if self.quiet => {}
                _ => self.print(format!("  {}", message.dimmed())),
            },

            Event::Status(status) => self.status_bar.set_message(status),

            Event::Title(title) => {
                if !self.quiet {
                    self.print(format!("{TV}{}", title.bold().green()));
                }
            }

            Event::OverallProgress(percent) => {
                if let Some(bar) = &self.overall_bar {
                    bar.set_position(percent.round() as u64);
                }
            }

            Event::ItemProgress(percent) => {
                if let Some(bar) = &self.item_bar {
                    bar.set_position(percent.round() as u64);
                }
            }

            Event::UiState(UiState::Disabled) => self.status_bar.enable_steady_tick(TICK),
            Event::UiState(UiState::Enabled) => self.status_bar.disable_steady_tick(),

            Event::AnalysisResult(result) => {
                if !self.quiet {
                    self.print(describe_analysis(&result));
                }
            }

            Event::CaptionOptions(tracks) => {
                if !self.quiet && tracks.offers_tracks() {
                    self.print(describe_captions(&tracks));
                }
            }

            Event::Error(message) => self.print(format!("{FAILURE}{}", message.red().bold())),

            Event::Success(message) => {
                self.print(format!("{PARTY}{}", message.bold().green()));
            }

            Event::BatchSummary(summary) => self.print_summary(&summary),
        }
    }

    fn print_summary(&self, summary: &BatchSummary) {
        if summary.failed_items.is_empty() {
            return;
        }

        self.print(format!("\n{}", "Failed items:".red().bold()));
        for failed in &summary.failed_items {
            self.print(format!(
                "  {}{} - {}",
                CROSS,
                truncate_title(&failed.title, 60).yellow(),
                failed.error.dimmed()
            ));
        }
    }

    fn finish(&self) {
        for bar in [&self.item_bar, &self.overall_bar].into_iter().flatten() {
            bar.finish();
        }
        self.status_bar.finish_and_clear();
    }

    /// Drain events every tick until the background task finishes
    async fn follow<T>(&mut self, rx: &mut EventReceiver, mut task: JoinHandle<T>) -> Result<T> {
        let mut ticker = tokio::time::interval(TICK);

        loop {
            tokio::select! {
                outcome = &mut task => {
                    for event in rx.drain() {
                        self.apply(event);
                    }
                    return outcome.context("Background task failed");
                }
                _ = ticker.tick() => {
                    for event in rx.drain() {
                        self.apply(event);
                    }
                }
            }
        }
    }
}

fn describe_analysis(result: &AnalysisResult) -> String {
    match result {
        AnalysisResult::Single { renditions, .. } => {
            let mut out = format!("{}\n", "Available formats:".bold());
            for (i, r) in renditions.iter().enumerate() {
                out.push_str(&format!(
                    "  {:>2}. {:<10} {:<6} {:>10} {:<14} {:>10}  id {}\n",
                    i + 1,
                    r.resolution_label,
                    r.video_codec.to_string(),
                    r.bitrate_kbps
                        .map(|kbps| format!("{:.0} kbps", kbps))
                        .unwrap_or_else(|| "-".to_string()),
                    if r.has_embedded_audio {
                        "with audio"
                    } else {
                        "video only"
                    },
                    r.size_label(),
                    r.format_id.cyan()
                ));
            }
            if renditions.is_empty() {
                out.push_str("  (no compatible video formats, audio only)\n");
            }
            out
        }
        AnalysisResult::Collection { entries, .. } => {
            let mut out = format!("{}\n", "Entries:".bold());
            for (i, entry) in entries.iter().enumerate() {
                out.push_str(&format!(
                    "  {:>3}. {}\n",
                    (i + 1).to_string().cyan(),
                    truncate_title(&entry.title, 70)
                ));
            }
            out
        }
    }
}

fn describe_captions(tracks: &CaptionTracks) -> String {
    let mut out = format!("{}\n", "Captions:".bold());
    for track in tracks.iter().filter(|t| t.code.is_some()) {
        out.push_str(&format!(
            "  {} ({})\n",
            track.label,
            track.code.as_deref().unwrap_or_default().cyan()
        ));
    }
    out
}

/// Resolve a caption argument against the offered tracks
fn caption_code(tracks: &CaptionTracks, requested: Option<&str>) -> Result<Option<String>> {
    let Some(requested) = requested else {
        return Ok(None);
    };

    match tracks.find(requested) {
        Some(track) => Ok(track.code.clone()),
        None => {
            let offered: Vec<_> = tracks.iter().map(|t| t.label.as_str()).collect();
            bail!(
                "Caption track '{}' is not available (offered: {})",
                requested,
                offered.join(", ")
            )
        }
    }
}

/// Load settings, install logging and verify the backend program
async fn prepare(args: &Args) -> Result<(Config, YtDlp)> {
    let config = Config::load().context("Failed to load settings")?;

    init_logger(&log_path(), args.verbose || config.log_enabled)
        .context("Failed to set up logging")?;

    let backend = YtDlp::new(&config.ytdlp_path);
    let version = backend
        .version()
        .await
        .map_err(|e| ConfigError::BackendUnavailable {
            program: config.ytdlp_path.display().to_string(),
            source: e,
        })
        .context("yt-dlp is required; install it or set ytdlp_path in the settings")?;
    log::info!("Using yt-dlp {}", version);

    Ok((config, backend))
}

async fn run_analyze(args: &Args, url: &str, entry: Option<usize>) -> Result<bool> {
    let (config, backend) = prepare(args).await?;
    let (reporter, mut rx) = event_channel();
    let session = Session::new(backend, config.download_settings(), reporter.shared())
        .context("Invalid settings")?;
    let mut console = Console::new(args.quiet)?;

    console.print(format!("{SEARCH}Analyzing {}", url.trim().cyan()));
    let task = session.start_analysis(url)?;
    let Some(result) = console.follow(&mut rx, task).await? else {
        console.finish();
        return Ok(false);
    };

    if let (Some(index), AnalysisResult::Collection { entries, .. }) = (entry, &result) {
        let entry = index
            .checked_sub(1)
            .and_then(|i| entries.get(i))
            .with_context(|| format!("Entry {} is out of range (1-{})", index, entries.len()))?;

        let task = session.start_entry_details(entry.clone())?;
        if let Some(tracks) = console.follow(&mut rx, task).await?
            && !tracks.offers_tracks()
        {
            console.print(format!("  No captions for '{}'", entry.title));
        }
    }

    console.finish();
    Ok(true)
}

async fn run_download(args: &Args, download: &DownloadArgs) -> Result<bool> {
    let (mut config, backend) = prepare(args).await?;
    if let Some(retries) = download.retries {
        config.max_retries = retries;
    }
    if let Some(delay) = download.delay {
        config.retry_delay_secs = delay;
    }
    if let Some(dir) = &download.output_dir {
        config.download_directory = dir.clone();
    }
    config.validate().context("Invalid settings")?;

    let (reporter, mut rx) = event_channel();
    let session = Session::new(backend, config.download_settings(), reporter.shared())
        .and_then(|session| session.with_output_directory(&config.download_directory))
        .context("Invalid settings")?;

    let mut console = Console::new(args.quiet)?;
    console.print(format!("{SEARCH}Analyzing {}", download.url.trim().cyan()));
    let task = session.start_analysis(&download.url)?;
    let Some(result) = console.follow(&mut rx, task).await? else {
        console.finish();
        return Ok(false);
    };

    let batch = match &result {
        AnalysisResult::Single {
            captions,
            title,
            renditions,
            ..
        } => {
            let selection = MediaSelection::for_single(
                renditions,
                download.audio,
                download.format.as_deref(),
            )?;
            let captions = caption_code(captions, download.captions.as_deref())?;
            session.single_batch(&download.url, title, selection, captions.as_deref())?
        }
        AnalysisResult::Collection { entries, .. } => {
            if download.audio || download.format.is_some() {
                console.print(format!(
                    "{WARNING}{}",
                    format!(
                        "Collections are downloaded at up to {}p; --format and --audio are ignored",
                        COLLECTION_MAX_HEIGHT
                    )
                    .yellow()
                ));
            }

            let selected = parse_selection(&download.entries, entries.len())?;

            // The caption choice comes from the first selected entry.
            let captions = match (download.captions.as_deref(), selected.first()) {
                (Some(requested), Some(&first)) => {
                    let task = session.start_entry_details(entries[first].clone())?;
                    let tracks = console.follow(&mut rx, task).await?.unwrap_or_default();
                    caption_code(&tracks, Some(requested))?
                }
                _ => None,
            };

            session.collection_batch(entries, &selected, captions.as_deref())?
        }
    };

    console.finish();
    let is_collection = matches!(result, AnalysisResult::Collection { .. });
    let mut console = Console::new(args.quiet)?.with_download_bars(is_collection)?;

    let task = session.start_download(batch)?;
    let summary = console.follow(&mut rx, task).await?;
    console.finish();

    if let Some(dir) = session.output_directory() {
        console.print(format!(
            "\n{FOLDER}Output: {}\n",
            dir.display().to_string().cyan()
        ));
    }

    Ok(match summary {
        Some(summary) => summary.success_count > 0 || summary.failure_count == 0,
        None => false,
    })
}

fn run_config(init: bool) -> Result<bool> {
    let config = Config::load().context("Failed to load settings")?;

    if init {
        let path = config.save().context("Failed to write settings")?;
        println!("{FOLDER}Wrote {}", path.display().to_string().cyan());
        return Ok(true);
    }

    println!("{FOLDER}{}\n", Config::path().display().to_string().cyan());
    println!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render settings")?
    );

    match config.validate() {
        Ok(()) => Ok(true),
        Err(e) => {
            println!("{FAILURE}{}", e.to_string().red());
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            CLAPPER,
            "tubepull".bold().magenta(),
            "- YouTube Downloader".dimmed()
        );
    }

    let succeeded = match &args.command {
        Command::Analyze { url, entry } => run_analyze(&args, url, *entry).await?,
        Command::Download(download) => run_download(&args, download).await?,
        Command::Config { init } => run_config(*init)?,
    };

    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
