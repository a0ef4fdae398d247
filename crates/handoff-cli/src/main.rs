mod catalog;
mod config;
mod ffmpeg;
mod logging;

use anyhow::{bail, Context, Result};
use catalog::DirectoryCatalog;
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{ConfigArgs, HandoffConfig};
use ffmpeg::FfmpegFrameSource;
use handoff_core::thumbnail::ThumbnailGenerator;
use handoff_core::{ActivationSignal, Channel, UrlShare};
use handoff_extension::{
    attachment, copy_into_container, file_url, Attachment, ExtensionConfig, HostSignal,
    ProducerError, ShareExtension,
};
use handoff_receiver::{
    DirectPaths, LaunchOptions, PlatformResolver, ShareReceiver, ShareUpdate,
};
use handoff_storage::SqliteGroupStore;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const VIDEO_EXTENSIONS: [&str; 6] = ["mov", "mp4", "m4v", "avi", "mkv", "webm"];

#[derive(Parser)]
#[command(name = "handoff")]
#[command(about = "Hand shared content from a share extension to its host app", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Act as the share extension
    Share {
        #[command(subcommand)]
        action: ShareCommands,
    },
    /// Deliver one wake-up url to a freshly started app and print its state
    Receive {
        signal: String,
        /// Treat the url as arriving while the app already runs
        #[arg(long, default_value_t = false)]
        warm: bool,
    },
    /// Run as the host app: wake-up urls (or command names) arrive on stdin
    Watch,
    /// Inspect the shared store
    Store {
        #[command(subcommand)]
        action: StoreCommands,
    },
}

#[derive(Subcommand)]
enum ShareCommands {
    /// Share one or more text snippets
    Text {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Share image and video files
    Media {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Share a link, optionally with one media file
    Url {
        url: String,
        #[arg(long)]
        media: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    List,
    Prune {
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

/// The command line has no app to wake; the url is printed for the caller to pass on.
struct PrintHost;

impl HostSignal for PrintHost {
    fn signal_host(&self, url: &str) -> Result<(), ProducerError> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{url}").map_err(|err| ProducerError::Signal(err.to_string()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = HandoffConfig::from_args(&cli.config);
    logging::init_logging(&config);
    info!(
        event = "handoff_start",
        namespace = %config.namespace,
        group_dir = %config.group_dir.display()
    );

    match cli.command {
        Commands::Share { action } => share(&config, action),
        Commands::Receive { signal, warm } => receive(&config, &signal, warm),
        Commands::Watch => watch(&config),
        Commands::Store { action } => store(&config, action),
    }
}

fn open_store(config: &HandoffConfig) -> Result<SqliteGroupStore> {
    std::fs::create_dir_all(&config.group_dir)
        .with_context(|| format!("Failed to create {}", config.group_dir.display()))?;
    SqliteGroupStore::open(config.store_path(), config.namespace.clone())
        .with_context(|| format!("Failed to open {}", config.store_path().display()))
}

fn thumbnails(config: &HandoffConfig) -> ThumbnailGenerator {
    ThumbnailGenerator::new(config.group_dir.clone(), Box::new(FfmpegFrameSource::default()))
}

fn attachment_for(path: &Path) -> Attachment {
    let is_video = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
    if is_video {
        Attachment::Video(path.to_path_buf())
    } else {
        Attachment::Image(path.to_path_buf())
    }
}

fn share(config: &HandoffConfig, action: ShareCommands) -> Result<()> {
    let extension = ShareExtension::new(
        ExtensionConfig {
            scheme: config.scheme.clone(),
            share_key: config.share_key.clone(),
            container_dir: config.group_dir.clone(),
        },
        Box::new(open_store(config)?),
        Box::new(PrintHost),
    )
    .with_thumbnails(thumbnails(config));

    match action {
        ShareCommands::Text { texts } => {
            let attachments = texts.into_iter().map(Attachment::Text).collect::<Vec<_>>();
            extension.share(&attachments).context("Failed to share text")?;
        }
        ShareCommands::Media { paths } => {
            let attachments = paths.iter().map(|path| attachment_for(path)).collect::<Vec<_>>();
            extension.share(&attachments).context("Failed to share media")?;
        }
        ShareCommands::Url { url, media } => {
            let media_path = match media {
                Some(path) => {
                    let default_ext = match attachment_for(&path) {
                        Attachment::Video(_) => attachment::DEFAULT_VIDEO_EXTENSION,
                        _ => attachment::DEFAULT_IMAGE_EXTENSION,
                    };
                    let copy = copy_into_container(&path, &config.group_dir, default_ext)
                        .with_context(|| format!("Failed to copy {}", path.display()))?;
                    Some(file_url(&copy))
                }
                None => None,
            };
            extension
                .share_url(&UrlShare {
                    url: Some(url),
                    media_path,
                })
                .context("Failed to share url")?;
        }
    }
    Ok(())
}

fn build_receiver(config: &HandoffConfig) -> Result<ShareReceiver> {
    let direct = DirectPaths::default().with_prefix(config.group_dir.to_string_lossy());
    let mut resolver = PlatformResolver::new(direct);
    if let Some(asset_dir) = &config.asset_dir {
        resolver = resolver.with_catalog(Box::new(DirectoryCatalog::new(asset_dir)));
    }
    Ok(
        ShareReceiver::new(Box::new(open_store(config)?), Box::new(resolver))
            .with_thumbnails(thumbnails(config)),
    )
}

fn snapshot(receiver: &ShareReceiver) -> Value {
    json!({
        "initial": {
            "media": receiver.initial_media(),
            "text": receiver.initial_text(),
            "url": receiver.initial_url(),
        },
        "latest": {
            "media": receiver.latest_media(),
            "text": receiver.latest_text(),
            "url": receiver.latest_url(),
        },
    })
}

fn receive(config: &HandoffConfig, signal: &str, warm: bool) -> Result<()> {
    let mut receiver = build_receiver(config)?;
    let accepted = if warm {
        receiver.on_open_url(signal)
    } else {
        receiver.on_launch(&LaunchOptions {
            url: Some(signal.to_string()),
            user_activities: Vec::new(),
        })
    };
    let mut state = snapshot(&receiver);
    state["accepted"] = json!(accepted);
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn update_line(update: &ShareUpdate) -> Value {
    let value = match update {
        ShareUpdate::Media(items) => json!(items),
        ShareUpdate::Text(text) => json!(text),
        ShareUpdate::Url(share) => json!(share),
    };
    json!({
        "channel": update.channel().as_str(),
        "value": value,
        "at": Utc::now().to_rfc3339(),
    })
}

fn watch(config: &HandoffConfig) -> Result<()> {
    let mut receiver = build_receiver(config)?;
    for channel in Channel::ALL {
        receiver.subscribe(
            channel,
            Box::new(|update: &ShareUpdate| println!("{}", update_line(update))),
        );
    }

    let mut launched = false;
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if let Some(reply) = watch_line(&mut receiver, line.trim(), &mut launched) {
            println!("{reply}");
        }
    }
    Ok(())
}

/// One stdin line of `watch`. Anything that parses as a url is an activation
/// (the first one cold); other lines are command names. Returns the command reply.
fn watch_line(receiver: &mut ShareReceiver, line: &str, launched: &mut bool) -> Option<String> {
    if line.is_empty() {
        return None;
    }
    if ActivationSignal::parse(line).is_err() {
        let reply = match receiver.handle_method(line) {
            Ok(Some(value)) => value,
            Ok(None) => "null".to_string(),
            Err(err) => json!({"error": err.code(), "message": err.to_string()}).to_string(),
        };
        return Some(reply);
    }
    let accepted = if *launched {
        receiver.on_open_url(line)
    } else {
        *launched = true;
        receiver.on_launch(&LaunchOptions {
            url: Some(line.to_string()),
            user_activities: Vec::new(),
        })
    };
    if !accepted {
        warn!(event = "watch_signal_ignored", signal = line);
    }
    None
}

fn store(config: &HandoffConfig, action: StoreCommands) -> Result<()> {
    let store = open_store(config)?;
    match action {
        StoreCommands::List => {
            let entries = store.entries().context("Failed to list entries")?;
            if entries.is_empty() {
                println!("No entries in {}", config.namespace);
                return Ok(());
            }
            for entry in entries {
                println!(
                    "{}\t{}\t{} bytes\t{}",
                    entry.key,
                    entry.kind,
                    entry.size,
                    entry.updated_at.to_rfc3339()
                );
            }
        }
        StoreCommands::Prune { older_than_hours } => {
            if older_than_hours < 0 {
                bail!("--older-than-hours must not be negative");
            }
            let cutoff = Utc::now() - chrono::Duration::hours(older_than_hours);
            let removed = store
                .prune_older_than(cutoff)
                .context("Failed to prune entries")?;
            println!("Removed {removed} entries");
        }
    }
    Ok(())
}
