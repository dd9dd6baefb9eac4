// mixtape - local-file music player
// Pick files into the catalog, then play them through a background session

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mixtape::{
    audio::{AudioFormat, RodioBackend},
    config::Config,
    session::{AlwaysGranted, SessionHandle, SessionRunner},
    ui::{self, ConsoleReporter, Input},
    SqliteCatalog, Track, TrackCatalog,
};
use rodio::OutputStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "mixtape")]
#[command(about = "Pick local audio files and play them")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    /// Use this config file instead of the one in the user config dir
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a file, or every supported file under a directory
    Add {
        path: PathBuf,
        /// Title for a single file (default: tag title or file name)
        #[arg(long)]
        title: Option<String>,
    },
    /// List the catalog in playing order
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove a track by id
    Remove { id: Uuid },
    /// Play the catalog, reading commands from stdin
    Play {
        /// Start with this track instead of the first one
        #[arg(long)]
        track: Option<Uuid>,
        #[arg(long)]
        repeat_one: bool,
    },
}

fn init_logging(log_dir: &Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "mixtape.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Base filter: info level for general logs, debug for mixtape
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mixtape=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // Dev mode mirrors everything to stderr as well
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let _guard = init_logging(&config.log_dir, args.dev)?;
    info!(db = %config.database_path.display(), "mixtape starting");

    let catalog = SqliteCatalog::open(&config.database_path)
        .with_context(|| format!("opening catalog {}", config.database_path.display()))?;

    match args.command {
        Command::Add { path, title } => add_tracks(&catalog, &path, title),
        Command::List { json } => list_tracks(&catalog, json),
        Command::Remove { id } => remove_track(&catalog, id),
        Command::Play { track, repeat_one } => {
            play(&config, Arc::new(catalog), track, repeat_one).await
        }
    }
}

fn add_tracks(catalog: &SqliteCatalog, path: &Path, title: Option<String>) -> Result<()> {
    if path.is_dir() {
        let mut added = 0usize;
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(Result::ok) {
            let entry_path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            // Skip hidden files (dotfiles)
            if entry_path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'))
            {
                continue;
            }
            if !AudioFormat::from_path(entry_path).is_supported() {
                debug!(path = %entry_path.display(), "skipping unsupported file");
                continue;
            }

            catalog.insert(&Track::from_path(&absolute(entry_path)))?;
            added += 1;
        }
        println!("Added {added} tracks from {}", path.display());
        return Ok(());
    }

    if !path.is_file() {
        bail!("no such file: {}", path.display());
    }
    if !AudioFormat::from_path(path).is_supported() {
        bail!("unsupported audio format: {}", path.display());
    }

    let mut track = Track::from_path(&absolute(path));
    if let Some(title) = title {
        track = track.with_title(title);
    }
    catalog.insert(&track)?;
    info!(id = %track.id(), title = %track.title(), "track added");
    println!("Added \"{}\" ({})", track.title(), track.id());
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn list_tracks(catalog: &SqliteCatalog, json: bool) -> Result<()> {
    let tracks = catalog.list_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tracks)?);
        return Ok(());
    }

    if tracks.is_empty() {
        println!("Catalog is empty. Add files with `mixtape add <path>`.");
    }
    print_tracks(&tracks);
    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    for (idx, track) in tracks.iter().enumerate() {
        let marker = if track.is_playable() { " " } else { "!" };
        println!("{:>3}.{marker} {}  [{}]", idx + 1, track.title(), track.id());
    }
}

fn remove_track(catalog: &SqliteCatalog, id: Uuid) -> Result<()> {
    if !catalog.delete_by_id(id)? {
        bail!("no track with id {id}");
    }
    println!("Removed {id}");
    Ok(())
}

async fn load_tracks(catalog: &Arc<SqliteCatalog>) -> Result<Vec<Track>> {
    let catalog = Arc::clone(catalog);
    let tracks = tokio::task::spawn_blocking(move || catalog.list_all()).await??;
    Ok(tracks)
}

async fn play(
    config: &Config,
    catalog: Arc<SqliteCatalog>,
    start: Option<Uuid>,
    repeat_one: bool,
) -> Result<()> {
    // The output stream must outlive the session; it stays on this thread.
    let (_stream, stream_handle) =
        OutputStream::try_default().context("no audio output device available")?;
    let backend = RodioBackend::new(stream_handle, config.playback.volume);

    let (mut runner, handle) = SessionRunner::new(
        backend,
        Box::new(AlwaysGranted),
        config.playback.tick_interval(),
    );
    runner.add_observer(Box::new(ConsoleReporter));
    #[cfg(feature = "notify")]
    {
        if config.ui.show_notifications {
            runner.add_observer(Box::new(ui::DesktopNotifier::new(3000)));
        }
    }
    let session_task = tokio::spawn(runner.with_catalog(catalog.clone()).run());

    let tracks = load_tracks(&catalog).await?;
    if tracks.is_empty() {
        println!("Catalog is empty. Add files with `mixtape add <path>`.");
    }
    handle.set_playlist(tracks)?;
    handle.set_repeat_one(repeat_one || config.playback.repeat_one)?;
    if let Some(id) = start {
        handle.select_track(id, true)?;
    }

    let progress_task = config
        .ui
        .print_progress
        .then(|| tokio::spawn(print_progress(handle.clone())));

    println!("{}", ui::HELP);
    let mut lines = spawn_stdin_reader();

    while let Some(line) = lines.recv().await {
        match ui::parse_input(&line) {
            Ok(Input::Quit) => break,
            Ok(Input::Session(command)) => handle.send(command)?,
            Ok(Input::ToggleRepeat) => {
                let repeat_one = !handle.snapshot().repeat_one;
                handle.set_repeat_one(repeat_one)?;
            }
            Ok(Input::Select(idx)) => {
                let tracks = load_tracks(&catalog).await?;
                match tracks.get(idx) {
                    Some(track) => {
                        handle.select_track(track.id(), config.playback.autoplay_on_select)?
                    }
                    None => eprintln!("no track number {}", idx + 1),
                }
            }
            Ok(Input::ListTracks) => print_tracks(&load_tracks(&catalog).await?),
            Ok(Input::Status) => println!("{}", ui::status_line(&handle.snapshot())),
            Ok(Input::Help) => println!("{}", ui::HELP),
            Err(msg) => eprintln!("{msg}"),
        }
    }

    info!("shutting down");
    if handle.shutdown().is_err() {
        warn!("session already stopped");
    }
    session_task.await?;
    if let Some(task) = progress_task {
        task.abort();
    }
    Ok(())
}

// Stdin is blocking; read it on its own thread and hand lines over.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) if tx.send(line).is_ok() => {}
                _ => break,
            }
        }
    });
    rx
}

async fn print_progress(handle: SessionHandle) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;
        let snapshot = handle.snapshot();
        if snapshot.is_playing() {
            println!("{}", ui::status_line(&snapshot));
        }
    }
}
