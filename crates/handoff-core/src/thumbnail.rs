//! Video thumbnails stored next to the shared media.
//!
//! A thumbnail lives at a path derived from the video's file name, so either
//! process can find one the other already produced.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const THUMBNAIL_EXTENSION: &str = "jpg";
pub const THUMBNAIL_BOUND: FrameSize = FrameSize {
    width: 360,
    height: 360,
};
pub const THUMBNAIL_AT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("video path has no file name: {0}")]
    NoFileName(PathBuf),
    #[error("video frame unavailable: {0}")]
    Frame(String),
    #[error("frame source reported success but {0} was not written")]
    Missing(PathBuf),
    #[error("thumbnail io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform facility that decodes video files.
pub trait VideoFrameSource {
    fn duration(&self, video: &Path) -> Result<Duration, ThumbnailError>;

    /// Writes the frame nearest `at` to `dest`, scaled down to fit `bound`
    /// with the aspect ratio preserved.
    fn write_frame(
        &self,
        video: &Path,
        at: Duration,
        bound: FrameSize,
        dest: &Path,
    ) -> Result<(), ThumbnailError>;
}

/// Reversible, filesystem-safe encoding of a video file name. Works on the
/// raw name bytes, so names that are not valid UTF-8 stay distinct.
pub fn thumbnail_file_name(video: &Path) -> Option<String> {
    let name = video.file_name()?;
    Some(format!(
        "{}.{THUMBNAIL_EXTENSION}",
        URL_SAFE_NO_PAD.encode(name.as_encoded_bytes())
    ))
}

/// Recovers the video file name a thumbnail was derived from.
pub fn video_name_for_thumbnail(thumbnail: &Path) -> Option<OsString> {
    let stem = thumbnail.file_stem()?.to_str()?;
    let bytes = URL_SAFE_NO_PAD.decode(stem).ok()?;
    name_from_bytes(bytes)
}

#[cfg(unix)]
fn name_from_bytes(bytes: Vec<u8>) -> Option<OsString> {
    use std::os::unix::ffi::OsStringExt;
    Some(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn name_from_bytes(bytes: Vec<u8>) -> Option<OsString> {
    String::from_utf8(bytes).ok().map(OsString::from)
}

pub fn thumbnail_path(dir: &Path, video: &Path) -> Option<PathBuf> {
    thumbnail_file_name(video).map(|name| dir.join(name))
}

/// Largest size with `source`'s aspect ratio that fits in `bound`. Never upscales.
pub fn fit_within(source: FrameSize, bound: FrameSize) -> FrameSize {
    if source.width == 0 || source.height == 0 {
        return FrameSize::new(0, 0);
    }
    if source.width <= bound.width && source.height <= bound.height {
        return source;
    }
    let scale = f64::min(
        f64::from(bound.width) / f64::from(source.width),
        f64::from(bound.height) / f64::from(source.height),
    );
    let width = (f64::from(source.width) * scale).round().max(1.0) as u32;
    let height = (f64::from(source.height) * scale).round().max(1.0) as u32;
    FrameSize::new(width.min(bound.width), height.min(bound.height))
}

pub struct ThumbnailGenerator {
    dir: PathBuf,
    source: Box<dyn VideoFrameSource>,
}

impl ThumbnailGenerator {
    pub fn new(dir: impl Into<PathBuf>, source: Box<dyn VideoFrameSource>) -> Self {
        Self {
            dir: dir.into(),
            source,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the thumbnail for `video`, generating it when it does not exist yet.
    pub fn ensure(&self, video: &Path) -> Result<PathBuf, ThumbnailError> {
        let dest = thumbnail_path(&self.dir, video)
            .ok_or_else(|| ThumbnailError::NoFileName(video.to_path_buf()))?;
        if dest.exists() {
            debug!(event = "thumbnail_reused", path = %dest.display());
            return Ok(dest);
        }
        std::fs::create_dir_all(&self.dir)?;
        self.source
            .write_frame(video, THUMBNAIL_AT, THUMBNAIL_BOUND, &dest)?;
        if !dest.exists() {
            return Err(ThumbnailError::Missing(dest));
        }
        debug!(event = "thumbnail_generated", path = %dest.display());
        Ok(dest)
    }

    /// Like [`ThumbnailGenerator::ensure`], but a failure only costs the thumbnail.
    pub fn ensure_or_skip(&self, video: &Path) -> Option<PathBuf> {
        match self.ensure(video) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(event = "thumbnail_failed", video = %video.display(), error = %err);
                None
            }
        }
    }

    /// Video length in whole milliseconds.
    pub fn duration_ms(&self, video: &Path) -> Option<f64> {
        match self.source.duration(video) {
            Ok(duration) => Some((duration.as_secs_f64() * 1000.0).round()),
            Err(err) => {
                warn!(event = "video_duration_failed", video = %video.display(), error = %err);
                None
            }
        }
    }
}
