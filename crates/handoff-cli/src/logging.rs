use crate::config::HandoffConfig;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins inside [`init_logging`]; this is the fallback directive.
fn default_directive(config: &HandoffConfig, level_env: Option<String>) -> String {
    match level_env.filter(|level| !level.trim().is_empty()) {
        Some(level) => level,
        None if config.debug => "debug".to_string(),
        None => "info".to_string(),
    }
}

fn open_log_file(log_dir: &Path, app_id: &str) -> io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("handoff-{app_id}.log")))
}

/// Stderr, teed into the log file when there is one. Stdout carries command output.
fn log_writer(file: Option<File>) -> BoxMakeWriter {
    match file {
        Some(file) => BoxMakeWriter::new(io::stderr.and(Arc::new(file))),
        None => BoxMakeWriter::new(io::stderr),
    }
}

pub fn init_logging(config: &HandoffConfig) {
    let directive = default_directive(config, std::env::var("HANDOFF_LOG_LEVEL").ok());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let file = config.log_dir.as_deref().and_then(|dir| {
        open_log_file(dir, &config.app_id)
            .map_err(|err| eprintln!("log_file_error: {err}"))
            .ok()
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_writer(file))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
