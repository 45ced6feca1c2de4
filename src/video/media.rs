//! `ffmpeg`/`ffprobe` wrappers: audio extraction and raw RGB frame decoding.

use std::ffi::OsString;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use async_stream::try_stream;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use futures_core::Stream;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// Errors raised by the media helpers.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The external binary could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Executable name or path.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `ffprobe` output did not contain usable dimensions.
    #[error("Could not determine video dimensions for {path}: {detail}")]
    Dimensions {
        /// Inspected file.
        path: PathBuf,
        /// Raw ffprobe output or exit status.
        detail: String,
    },
    /// Reading decoded frames failed.
    #[error("Frame decoding failed: {0}")]
    Io(#[from] std::io::Error),
    /// A decoded buffer did not match the reported frame geometry.
    #[error("Decoded frame does not match {width}x{height}")]
    FrameSize {
        /// Expected width.
        width: u32,
        /// Expected height.
        height: u32,
    },
}

/// Pinned stream of decoded RGB frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RgbImage, MediaError>> + Send>>;

/// Extracts a mono 16 kHz PCM track from a video.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write the audio track and return the path it was written to.
    ///
    /// The returned path may not exist if the tool failed; callers check before reading.
    async fn extract(&self, video: &Path) -> Result<PathBuf, MediaError>;
}

/// Decodes frames from a video file.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// The first frame, or `None` when the video has no decodable frames.
    async fn first_frame(&self, video: &Path) -> Result<Option<RgbImage>, MediaError>;

    /// Every frame in order.
    async fn frames(&self, video: &Path) -> Result<FrameStream, MediaError>;
}

/// Arguments for the audio extraction command.
pub fn audio_extraction_args(video: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), video.into()];
    args.extend(
        ["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// [`AudioExtractor`] that shells out to `ffmpeg`, overwriting a fixed output file.
pub struct FfmpegAudioExtractor {
    ffmpeg: String,
    output: PathBuf,
}

impl FfmpegAudioExtractor {
    /// Extractor writing to `output` with the given `ffmpeg` executable.
    pub fn new(ffmpeg: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            output: output.into(),
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, video: &Path) -> Result<PathBuf, MediaError> {
        match tokio::fs::remove_file(&self.output).await {
            Ok(()) => tracing::debug!(audio = %self.output.display(), "Removed stale audio file"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(MediaError::Io(error)),
        }

        let output = Command::new(&self.ffmpeg)
            .args(audio_extraction_args(video, &self.output))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        if output.status.success() {
            tracing::debug!(video = %video.display(), audio = %self.output.display(), "Extracted audio track");
        } else {
            tracing::warn!(
                video = %video.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ffmpeg exited with a failure status while extracting audio"
            );
        }
        Ok(self.output.clone())
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

/// Parse `ffprobe -of json` output into the dimensions of the frames `ffmpeg` will emit.
///
/// `ffmpeg` applies rotation metadata while decoding, so a stream stored at 1920x1080 with a
/// 90 degree rotation comes out as 1080x1920. Both the display-matrix side data and the legacy
/// `rotate` tag are honored.
pub fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let output: FfprobeOutput = serde_json::from_str(raw).ok()?;
    let stream = output.streams.into_iter().next()?;
    let (width, height) = (stream.width?, stream.height?);
    if width == 0 || height == 0 {
        return None;
    }

    let rotation = stream
        .side_data_list
        .iter()
        .find_map(|side_data| side_data.rotation)
        .or_else(|| stream.tags.rotate.as_deref()?.trim().parse().ok())
        .unwrap_or(0.0);
    let quarter_turns = (rotation / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

/// [`FrameDecoder`] reading `rgb24` frames from `ffmpeg` stdout.
pub struct FfmpegFrameDecoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegFrameDecoder {
    /// Decoder using the given executables.
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn read_dimensions(&self, video: &Path) -> Result<(u32, u32), MediaError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height:stream_tags=rotate:stream_side_data=rotation",
                "-of",
                "json",
            ])
            .arg(video)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffprobe.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_dimensions(&stdout).ok_or_else(|| MediaError::Dimensions {
            path: video.to_path_buf(),
            detail: if output.status.success() {
                stdout.trim().to_string()
            } else {
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )
            },
        })
    }

    fn decode_command(&self, video: &Path, max_frames: Option<u32>) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command.args(["-v", "error", "-i"]).arg(video);
        if let Some(limit) = max_frames {
            command.arg("-frames:v").arg(limit.to_string());
        }
        command
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn first_frame(&self, video: &Path) -> Result<Option<RgbImage>, MediaError> {
        let (width, height) = self.read_dimensions(video).await?;
        let output = self
            .decode_command(video, Some(1))
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        let frame_len = frame_len(width, height);
        if output.stdout.len() < frame_len {
            return Ok(None);
        }
        let mut bytes = output.stdout;
        bytes.truncate(frame_len);
        RgbImage::from_raw(width, height, bytes)
            .map(Some)
            .ok_or(MediaError::FrameSize { width, height })
    }

    async fn frames(&self, video: &Path) -> Result<FrameStream, MediaError> {
        let (width, height) = self.read_dimensions(video).await?;
        let mut child = self
            .decode_command(video, None)
            .spawn()
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::Io(std::io::Error::other("ffmpeg stdout was not captured"))
        })?;
        tracing::debug!(video = %video.display(), width, height, "Streaming decoded frames");
        Ok(Box::pin(read_frames(child, stdout, width, height)))
    }
}

fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

fn read_frames(
    mut child: Child,
    mut stdout: ChildStdout,
    width: u32,
    height: u32,
) -> impl Stream<Item = Result<RgbImage, MediaError>> + Send {
    try_stream! {
        let mut buffer = vec![0_u8; frame_len(width, height)];
        loop {
            match stdout.read_exact(&mut buffer).await {
                Ok(_) => {}
                Err(error) if error.kind() == ErrorKind::UnexpectedEof => break,
                Err(error) => Err(MediaError::Io(error))?,
            }
            let frame = RgbImage::from_raw(width, height, buffer.clone())
                .ok_or(MediaError::FrameSize { width, height })?;
            yield frame;
        }

        let status = child.wait().await?;
        if !status.success() {
            tracing::warn!(%status, "ffmpeg exited with a failure status while decoding frames");
        }
    }
}

/// Encode a frame as PNG and return it base64 encoded.
pub fn encode_png_base64(frame: &RgbImage) -> Result<String, image::ImageError> {
    let mut png = Cursor::new(Vec::new());
    PngEncoder::new(&mut png).write_image(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(general_purpose::STANDARD.encode(png.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_args_match_pcm_mono_16k() {
        let args = audio_extraction_args(Path::new("in.mp4"), Path::new("audio.wav"));
        let args: Vec<_> = args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-y", "-i", "in.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1",
                "audio.wav"
            ]
        );
    }

    #[test]
    fn parse_dimensions_reads_ffprobe_json() {
        assert_eq!(
            parse_dimensions(r#"{ "streams": [ { "width": 640, "height": 480 } ] }"#),
            Some((640, 480))
        );
        assert_eq!(
            parse_dimensions(r#"{ "streams": [ { "width": 0, "height": 480 } ] }"#),
            None
        );
        assert_eq!(parse_dimensions(r#"{ "streams": [] }"#), None);
        assert_eq!(parse_dimensions("{}"), None);
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("N/A"), None);
    }

    #[test]
    fn rotated_portrait_recordings_swap_dimensions() {
        let display_matrix = r#"{ "streams": [ {
            "width": 1920, "height": 1080,
            "side_data_list": [ { "side_data_type": "Display Matrix", "rotation": -90 } ]
        } ] }"#;
        assert_eq!(parse_dimensions(display_matrix), Some((1080, 1920)));

        let legacy_tag =
            r#"{ "streams": [ { "width": 1920, "height": 1080, "tags": { "rotate": "270" } } ] }"#;
        assert_eq!(parse_dimensions(legacy_tag), Some((1080, 1920)));

        let upside_down = r#"{ "streams": [ {
            "width": 1920, "height": 1080,
            "side_data_list": [ { "rotation": 180 } ]
        } ] }"#;
        assert_eq!(parse_dimensions(upside_down), Some((1920, 1080)));
    }

    #[test]
    fn png_encoding_produces_png_signature() {
        let frame = RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]));
        let encoded = encode_png_base64(&frame).expect("encode");
        let bytes = general_purpose::STANDARD.decode(encoded).expect("base64");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn missing_ffmpeg_reports_spawn_error() {
        let extractor = FfmpegAudioExtractor::new("definitely-not-ffmpeg-binary", "out.wav");
        let error = extractor
            .extract(Path::new("video.mp4"))
            .await
            .expect_err("spawn");
        assert!(matches!(error, MediaError::Spawn { .. }));
    }
}
