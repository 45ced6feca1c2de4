//! Per-frame posture and blink heuristics.
//!
//! Posture compares the normalized height of the two shoulders; blinking is approximated by the
//! mean brightness of a fixed eye rectangle. Neither heuristic is face-aware, so both are only
//! rough signals for the feedback prompt.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use image::RgbImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::{BehaviorSettings, EyeRegion};
use crate::video::media::{FrameDecoder, encode_png_base64};

/// Errors raised by pose estimators.
#[derive(Debug, Error)]
pub enum PoseError {
    /// The frame could not be encoded for upload.
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    /// HTTP layer failed before receiving a response.
    #[error("Pose request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Estimator answered with a non-success status.
    #[error("Pose service error (status {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Normalized landmark coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Landmark {
    /// Horizontal position in `[0, 1]`.
    pub x: f32,
    /// Vertical position in `[0, 1]`.
    pub y: f32,
}

/// Left and right shoulder landmarks of the detected person.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ShoulderLandmarks {
    /// Left shoulder.
    #[serde(rename = "left_shoulder")]
    pub left: Landmark,
    /// Right shoulder.
    #[serde(rename = "right_shoulder")]
    pub right: Landmark,
}

impl ShoulderLandmarks {
    /// Absolute vertical offset between the shoulders.
    pub fn asymmetry(&self) -> f32 {
        (self.left.y - self.right.y).abs()
    }
}

/// Locates shoulders in a frame.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// Shoulder landmarks, or `None` when no person was detected.
    async fn shoulders(&self, frame: &RgbImage) -> Result<Option<ShoulderLandmarks>, PoseError>;
}

/// Estimator used when no endpoint is configured; never detects a person.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPoseEstimator;

#[async_trait]
impl PoseEstimator for DisabledPoseEstimator {
    async fn shoulders(&self, _frame: &RgbImage) -> Result<Option<ShoulderLandmarks>, PoseError> {
        Ok(None)
    }
}

#[derive(Deserialize)]
struct PoseResponse {
    #[serde(default)]
    landmarks: Option<ShoulderLandmarks>,
}

/// Posts base64 PNG frames to an external pose-landmark service.
pub struct HttpPoseEstimator {
    http: Client,
    url: String,
}

impl HttpPoseEstimator {
    /// Estimator posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl PoseEstimator for HttpPoseEstimator {
    async fn shoulders(&self, frame: &RgbImage) -> Result<Option<ShoulderLandmarks>, PoseError> {
        let image = encode_png_base64(frame)?;
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "image": image }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PoseError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: PoseResponse = response.json().await?;
        Ok(payload.landmarks)
    }
}

/// Mean grayscale intensity of `region`, clipped to the frame. `None` when the clipped region is
/// empty.
pub fn eye_region_brightness(frame: &RgbImage, region: EyeRegion) -> Option<f64> {
    let x_end = region.x.saturating_add(region.width).min(frame.width());
    let y_end = region.y.saturating_add(region.height).min(frame.height());
    if region.x >= x_end || region.y >= y_end {
        return None;
    }

    let mut total = 0.0_f64;
    for y in region.y..y_end {
        for x in region.x..x_end {
            let [r, g, b] = frame.get_pixel(x, y).0;
            total += 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
        }
    }
    let count = f64::from(x_end - region.x) * f64::from(y_end - region.y);
    Some(total / count)
}

/// Running posture and blink counts over a sequence of frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorTally {
    /// Frames observed.
    pub frames: u64,
    /// Frames whose shoulders exceeded the asymmetry threshold.
    pub posture_issues: u64,
    /// Frames whose eye region was darker than the brightness threshold.
    pub blinks: u64,
}

/// Normalized per-frame rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BehaviorScores {
    /// Posture issues per frame, in `[0, 1]`.
    pub posture_score: f64,
    /// Blinks per frame, in `[0, 1]`.
    pub blink_rate: f64,
}

impl BehaviorTally {
    /// Record one frame.
    pub fn observe(
        &mut self,
        frame: &RgbImage,
        shoulders: Option<ShoulderLandmarks>,
        settings: &BehaviorSettings,
    ) {
        self.frames += 1;
        if shoulders.is_some_and(|landmarks| {
            landmarks.asymmetry() > settings.posture_asymmetry_threshold
        }) {
            self.posture_issues += 1;
        }
        if eye_region_brightness(frame, settings.eye_region)
            .is_some_and(|brightness| brightness < settings.eye_brightness_threshold)
        {
            self.blinks += 1;
        }
    }

    /// Counts divided by the number of frames (at least one).
    pub fn scores(&self) -> BehaviorScores {
        let frames = self.frames.max(1) as f64;
        BehaviorScores {
            posture_score: self.posture_issues as f64 / frames,
            blink_rate: self.blinks as f64 / frames,
        }
    }
}

/// Scan every frame of `video` and tally posture issues and blinks.
///
/// Decoding problems never fail the scan: a video that cannot be opened yields an empty tally
/// (both scores 0), and a stream error ends the scan with the frames counted so far.
pub async fn scan_behavior(
    decoder: &dyn FrameDecoder,
    estimator: &dyn PoseEstimator,
    video: &Path,
    settings: &BehaviorSettings,
) -> BehaviorTally {
    let mut tally = BehaviorTally::default();
    let mut frames = match decoder.frames(video).await {
        Ok(frames) => frames,
        Err(error) => {
            tracing::warn!(video = %video.display(), %error, "Could not decode frames; behavior scores default to 0");
            return tally;
        }
    };

    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(frame = tally.frames, %error, "Frame decoding stopped early");
                break;
            }
        };
        let shoulders = match estimator.shoulders(&frame).await {
            Ok(shoulders) => shoulders,
            Err(error) => {
                tracing::warn!(frame = tally.frames, %error, "Pose estimation failed; frame skipped for posture");
                None
            }
        };
        tally.observe(&frame, shoulders, settings);
    }

    tracing::debug!(
        frames = tally.frames,
        posture_issues = tally.posture_issues,
        blinks = tally.blinks,
        "Behavior scan complete"
    );
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::media::{FrameStream, MediaError};
    use httpmock::{Method::POST, MockServer};

    fn uniform(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
    }

    fn shoulders(left_y: f32, right_y: f32) -> ShoulderLandmarks {
        ShoulderLandmarks {
            left: Landmark { x: 0.3, y: left_y },
            right: Landmark { x: 0.7, y: right_y },
        }
    }

    #[test]
    fn brightness_uses_luma_weights() {
        let frame = RgbImage::from_pixel(640, 480, image::Rgb([100, 50, 200]));
        let brightness = eye_region_brightness(&frame, EyeRegion::default()).expect("region");
        let expected = 0.299 * 100.0 + 0.587 * 50.0 + 0.114 * 200.0;
        assert!((brightness - expected).abs() < 1e-6);
    }

    #[test]
    fn region_outside_frame_is_empty() {
        let small = uniform(100, 80, 0);
        assert_eq!(eye_region_brightness(&small, EyeRegion::default()), None);

        let mut tally = BehaviorTally::default();
        tally.observe(&small, None, &BehaviorSettings::default());
        assert_eq!(tally.blinks, 0);
    }

    #[test]
    fn region_is_clipped_at_frame_edge() {
        let frame = uniform(300, 120, 40);
        let brightness = eye_region_brightness(&frame, EyeRegion::default()).expect("clipped");
        assert!((brightness - 40.0).abs() < 1e-6);
    }

    #[test]
    fn tally_counts_issues_and_blinks() {
        let settings = BehaviorSettings::default();
        let dark = uniform(640, 480, 20);
        let bright = uniform(640, 480, 200);

        let mut tally = BehaviorTally::default();
        tally.observe(&dark, Some(shoulders(0.40, 0.50)), &settings);
        tally.observe(&bright, Some(shoulders(0.40, 0.42)), &settings);
        tally.observe(&bright, None, &settings);
        tally.observe(&dark, Some(shoulders(0.40, 0.40)), &settings);

        assert_eq!(
            tally,
            BehaviorTally {
                frames: 4,
                posture_issues: 1,
                blinks: 2
            }
        );
        let scores = tally.scores();
        assert!((scores.posture_score - 0.25).abs() < f64::EPSILON);
        assert!((scores.blink_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_tally_scores_zero() {
        assert_eq!(BehaviorTally::default().scores(), BehaviorScores::default());
    }

    struct VecDecoder(Vec<RgbImage>);

    #[async_trait]
    impl FrameDecoder for VecDecoder {
        async fn first_frame(&self, _video: &Path) -> Result<Option<RgbImage>, MediaError> {
            Ok(self.0.first().cloned())
        }

        async fn frames(&self, _video: &Path) -> Result<FrameStream, MediaError> {
            let frames: Vec<Result<RgbImage, MediaError>> =
                self.0.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures_util::stream::iter(frames)))
        }
    }

    struct FlakyEstimator;

    #[async_trait]
    impl PoseEstimator for FlakyEstimator {
        async fn shoulders(
            &self,
            frame: &RgbImage,
        ) -> Result<Option<ShoulderLandmarks>, PoseError> {
            if frame.get_pixel(0, 0).0[0] > 100 {
                Err(PoseError::Api {
                    status: 500,
                    body: "no model".into(),
                })
            } else {
                Ok(Some(shoulders(0.2, 0.5)))
            }
        }
    }

    #[tokio::test]
    async fn scan_treats_pose_errors_as_no_issue() {
        let decoder = VecDecoder(vec![uniform(640, 480, 10), uniform(640, 480, 200)]);
        let tally = scan_behavior(
            &decoder,
            &FlakyEstimator,
            Path::new("video.mp4"),
            &BehaviorSettings::default(),
        )
        .await;

        assert_eq!(tally.frames, 2);
        assert_eq!(tally.posture_issues, 1);
        assert_eq!(tally.blinks, 1);
    }

    struct BrokenDecoder {
        frames_before_error: usize,
    }

    #[async_trait]
    impl FrameDecoder for BrokenDecoder {
        async fn first_frame(&self, _video: &Path) -> Result<Option<RgbImage>, MediaError> {
            Ok(None)
        }

        async fn frames(&self, video: &Path) -> Result<FrameStream, MediaError> {
            if self.frames_before_error == 0 {
                return Err(MediaError::Dimensions {
                    path: video.to_path_buf(),
                    detail: "no video stream".into(),
                });
            }
            let mut frames: Vec<Result<RgbImage, MediaError>> = (0..self.frames_before_error)
                .map(|_| Ok(uniform(640, 480, 10)))
                .collect();
            frames.push(Err(MediaError::FrameSize {
                width: 640,
                height: 480,
            }));
            frames.push(Ok(uniform(640, 480, 10)));
            Ok(Box::pin(futures_util::stream::iter(frames)))
        }
    }

    #[tokio::test]
    async fn undecodable_video_scores_zero() {
        let tally = scan_behavior(
            &BrokenDecoder {
                frames_before_error: 0,
            },
            &DisabledPoseEstimator,
            Path::new("audio_only.m4a"),
            &BehaviorSettings::default(),
        )
        .await;

        assert_eq!(tally, BehaviorTally::default());
        assert_eq!(tally.scores(), BehaviorScores::default());
    }

    #[tokio::test]
    async fn stream_error_keeps_frames_seen_so_far() {
        let tally = scan_behavior(
            &BrokenDecoder {
                frames_before_error: 2,
            },
            &DisabledPoseEstimator,
            Path::new("truncated.mp4"),
            &BehaviorSettings::default(),
        )
        .await;

        assert_eq!(tally.frames, 2);
        assert_eq!(tally.blinks, 2);
        assert_eq!(tally.posture_issues, 0);
    }

    #[tokio::test]
    async fn http_estimator_parses_landmarks() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/pose");
                then.status(200).json_body(json!({
                    "landmarks": {
                        "left_shoulder": { "x": 0.3, "y": 0.41 },
                        "right_shoulder": { "x": 0.7, "y": 0.48 }
                    }
                }));
            })
            .await;

        let estimator = HttpPoseEstimator::new(server.url("/pose"));
        let landmarks = estimator
            .shoulders(&uniform(4, 4, 0))
            .await
            .expect("pose")
            .expect("landmarks");
        assert!((landmarks.asymmetry() - 0.07).abs() < 1e-6);
    }

    #[tokio::test]
    async fn http_estimator_handles_no_person() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/pose");
                then.status(200).json_body(json!({ "landmarks": null }));
            })
            .await;

        let estimator = HttpPoseEstimator::new(server.url("/pose"));
        assert!(estimator.shoulders(&uniform(4, 4, 0)).await.expect("pose").is_none());
        assert!(DisabledPoseEstimator.shoulders(&uniform(4, 4, 0)).await.expect("pose").is_none());
    }
}
