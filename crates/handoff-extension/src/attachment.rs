use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_IMAGE_EXTENSION: &str = "png";
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// One item the user picked in the share sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Image(PathBuf),
    Video(PathBuf),
    Text(String),
    Url(String),
}

impl Attachment {
    pub fn kind(&self) -> &'static str {
        match self {
            Attachment::Image(_) => "image",
            Attachment::Video(_) => "video",
            Attachment::Text(_) => "text",
            Attachment::Url(_) => "url",
        }
    }
}

/// Copies `source` into the shared container under a fresh name. The source
/// may vanish with the extension process, so the consumer only ever sees the copy.
pub fn copy_into_container(
    source: &Path,
    container: &Path,
    default_extension: &str,
) -> io::Result<PathBuf> {
    let extension = source
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(default_extension);
    fs::create_dir_all(container)?;
    let dest = container.join(format!("{}.{extension}", Uuid::new_v4()));
    if dest.exists() {
        fs::remove_file(&dest)?;
    }
    fs::copy(source, &dest)?;
    Ok(dest)
}

/// `file://` form of a path, as stored in media payloads.
pub fn file_url(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}
