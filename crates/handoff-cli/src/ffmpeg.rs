//! Video frames through the `ffprobe`/`ffmpeg` executables.

use handoff_core::thumbnail::{fit_within, FrameSize, ThumbnailError, VideoFrameSource};
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffprobe: String,
    ffmpeg: String,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new("ffprobe", "ffmpeg")
    }
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<ReportStream>,
    #[serde(default)]
    format: Option<ReportFormat>,
}

#[derive(Debug, Deserialize)]
struct ReportStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StreamInfo {
    size: Option<FrameSize>,
    duration: Option<Duration>,
}

fn parse_stream_info(json: &str) -> Result<StreamInfo, ThumbnailError> {
    let output: StreamReport = serde_json::from_str(json)
        .map_err(|err| ThumbnailError::Frame(format!("unreadable ffprobe output: {err}")))?;
    let stream = output.streams.first();
    let size = stream.and_then(|stream| match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => {
            Some(FrameSize::new(width, height))
        }
        _ => None,
    });
    let duration = output
        .format
        .and_then(|format| format.duration)
        .or_else(|| stream.and_then(|stream| stream.duration.clone()))
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);
    Ok(StreamInfo { size, duration })
}

fn command_failure(what: &str, output: &Output) -> ThumbnailError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    ThumbnailError::Frame(format!("{what} exited with {}: {}", output.status, stderr.trim()))
}

impl FfmpegFrameSource {
    pub fn new(ffprobe: impl Into<String>, ffmpeg: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    fn stream_info(&self, video: &Path) -> Result<StreamInfo, ThumbnailError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration:format=duration",
                "-print_format",
                "json",
            ])
            .arg(video)
            .output()?;
        if !output.status.success() {
            return Err(command_failure(&self.ffprobe, &output));
        }
        parse_stream_info(&String::from_utf8_lossy(&output.stdout))
    }
}

impl VideoFrameSource for FfmpegFrameSource {
    fn duration(&self, video: &Path) -> Result<Duration, ThumbnailError> {
        self.stream_info(video)?
            .duration
            .ok_or_else(|| ThumbnailError::Frame(format!("no duration for {}", video.display())))
    }

    fn write_frame(
        &self,
        video: &Path,
        at: Duration,
        bound: FrameSize,
        dest: &Path,
    ) -> Result<(), ThumbnailError> {
        let info = self.stream_info(video)?;
        let size = info
            .size
            .ok_or_else(|| ThumbnailError::Frame(format!("no video stream in {}", video.display())))?;
        let target = fit_within(size, bound);
        // Clips shorter than the capture time fall back to their first frame.
        let at = match info.duration {
            Some(duration) if duration <= at => Duration::ZERO,
            _ => at,
        };
        debug!(
            event = "ffmpeg_frame",
            video = %video.display(),
            at_ms = at.as_millis() as u64,
            width = target.width,
            height = target.height
        );

        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-y", "-ss"])
            .arg(format!("{:.3}", at.as_secs_f64()))
            .arg("-i")
            .arg(video)
            .args(["-frames:v", "1", "-vf"])
            .arg(format!("scale={}:{}", target.width, target.height))
            .arg(dest)
            .output()?;
        if !output.status.success() {
            return Err(command_failure(&self.ffmpeg, &output));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(info: &StreamInfo) -> Option<u64> {
        info.duration
            .map(|duration| (duration.as_secs_f64() * 1000.0).round() as u64)
    }

    #[test]
    fn reads_size_and_format_duration() {
        let info = parse_stream_info(
            r#"{
                "programs": [],
                "streams": [{"width": 1920, "height": 1080, "duration": "9.000000"}],
                "format": {"duration": "12.480000"}
            }"#,
        )
        .expect("parse");
        assert_eq!(info.size, Some(FrameSize::new(1920, 1080)));
        assert_eq!(millis(&info), Some(12_480));
    }

    #[test]
    fn falls_back_to_stream_duration() {
        let info = parse_stream_info(r#"{"streams": [{"width": 640, "height": 480, "duration": "3.5"}]}"#)
            .expect("parse");
        assert_eq!(millis(&info), Some(3_500));
    }

    #[test]
    fn no_video_stream_means_no_size() {
        let info = parse_stream_info(r#"{"streams": [], "format": {"duration": "N/A"}}"#).expect("parse");
        assert_eq!(info.size, None);
        assert_eq!(info.duration, None);
    }

    #[test]
    fn garbage_stream_report_is_a_frame_error() {
        assert!(matches!(
            parse_stream_info("not json"),
            Err(ThumbnailError::Frame(_))
        ));
    }

    #[test]
    fn missing_executable_surfaces_as_io_error() {
        let source = FfmpegFrameSource::new("handoff-no-such-ffprobe", "handoff-no-such-ffmpeg");
        assert!(matches!(
            source.duration(Path::new("/nonexistent.mov")),
            Err(ThumbnailError::Io(_))
        ));
    }
}
