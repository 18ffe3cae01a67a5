use super::{KeypointDetector, RawDetection};
use crate::keypoints::{RawKeypoint, Vocabulary};
use crate::shapes::rect::Rect;
use anyhow::{Context, Error, Result};
use image::RgbImage;
use image::imageops::{FilterType, resize};
use ndarray::{Array, ArrayView2, Axis, Ix2};
use ort::execution_providers;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use std::path::PathBuf;
use tracing::{Level, debug, span, trace};

const HEIGHT: u32 = 640;
const WIDTH: u32 = 640;

/// Boxes overlapping more than this (percent) are the same person
const MAX_OVERLAP_PCT: f32 = 45.;

#[derive(Debug, Clone)]
pub struct PoseDetectorOptions {
    pub model_path: PathBuf,
    /// Minimum person confidence, [0, 1]
    pub threshold: f32,
    pub threads: usize,
}

/// YOLO pose model wrapper.
///
/// Model input: 1x3x640x640 f32 RGB in 0..1, letterboxed to the top-left.
/// Model output: 1x(5 + 3K)x8400, one column per candidate: box centre
/// x/y, width, height, person confidence, then K keypoints as x, y,
/// visibility, with K the number of COCO keypoints.
pub struct PoseDetector {
    model: Session,
    vocabulary: Vocabulary,
    threshold: f32,
}

impl PoseDetector {
    pub fn new(options: &PoseDetectorOptions) -> Result<PoseDetector> {
        ort::init()
            .with_execution_providers([
                execution_providers::XNNPACKExecutionProvider::default().build()
            ])
            .commit()?;

        let model = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.threads.max(1))?
            .commit_from_file(&options.model_path)
            .with_context(|| {
                format!("Failed to load model {}", options.model_path.display())
            })?;

        Ok(PoseDetector {
            model,
            vocabulary: Vocabulary::coco(),
            threshold: options.threshold,
        })
    }
}

impl KeypointDetector for PoseDetector {
    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<RawDetection>> {
        let span = span!(Level::DEBUG, "pose_detector");
        let _guard = span.enter();

        let (resized_width, resized_height) = fit_within(frame.width(), frame.height());
        let resized = resize(frame, resized_width, resized_height, FilterType::Triangle);

        let model_input =
            Array::from_shape_fn((1, 3, HEIGHT as usize, WIDTH as usize), |(_, c, y, x)| {
                let x = x as u32;
                let y = y as u32;
                if y >= resized_height || x >= resized_width {
                    0.
                } else {
                    resized.get_pixel(x, y)[c] as f32 / 255.
                }
            });

        let input = Tensor::from_array(model_input)?;
        let outputs = self.model.run(ort::inputs!["images" => input]?)?;
        let output = outputs["output0"].try_extract_tensor::<f32>()?;
        let candidates = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;

        let detections = process_result(
            candidates,
            self.vocabulary.len(),
            self.threshold,
            frame.width() as f32 / resized_width as f32,
            frame.height() as f32 / resized_height as f32,
        )?;
        debug!("Pose detection found {} people", detections.len());

        Ok(detections)
    }
}

/// Largest size with the frame's aspect ratio that fits the model input.
fn fit_within(width: u32, height: u32) -> (u32, u32) {
    let ratio = (WIDTH as f32 / width.max(1) as f32).min(HEIGHT as f32 / height.max(1) as f32);
    let w = ((width as f32 * ratio).round() as u32).clamp(1, WIDTH);
    let h = ((height as f32 * ratio).round() as u32).clamp(1, HEIGHT);
    (w, h)
}

fn process_result(
    candidates: ArrayView2<f32>,
    keypoint_count: usize,
    threshold: f32,
    x_scale: f32,
    y_scale: f32,
) -> Result<Vec<RawDetection>> {
    let expected_rows = 5 + keypoint_count * 3;
    if candidates.nrows() != expected_rows {
        return Err(Error::msg(format!(
            "Expected {expected_rows} values per pose candidate, model produced {}",
            candidates.nrows()
        )));
    }

    let mut detections: Vec<RawDetection> = Vec::new();
    for col in candidates.columns() {
        let confidence = col[4];
        if !(confidence >= threshold) {
            continue;
        }

        let bounds = Rect::from_center(col[0], col[1], col[2], col[3]).scale(x_scale, y_scale);

        // keep only the most confident of overlapping candidates
        let has_better_dup = detections.iter().any(|d| {
            d.confidence >= confidence
                && d.bounds
                    .is_some_and(|b| b.overlap_pct(&bounds) > MAX_OVERLAP_PCT)
        });
        if has_better_dup {
            continue;
        }
        detections.retain(|d| {
            !d.bounds
                .is_some_and(|b| b.overlap_pct(&bounds) > MAX_OVERLAP_PCT)
        });

        let keypoints = (0..keypoint_count)
            .map(|k| {
                let idx = 5 + k * 3;
                RawKeypoint::new(col[idx] * x_scale, col[idx + 1] * y_scale, col[idx + 2])
            })
            .collect();

        trace!("Candidate {confidence} at {bounds:?}");
        detections.push(RawDetection {
            keypoints,
            confidence,
            bounds: Some(bounds),
        });
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn candidate(cx: f32, cy: f32, confidence: f32, eye_score: f32) -> Vec<f32> {
        let mut col = vec![cx, cy, 40., 60., confidence];
        for k in 0..17 {
            let score = if k == 1 || k == 2 { eye_score } else { 0.1 };
            col.extend([cx + k as f32, cy - 10., score]);
        }
        col
    }

    fn candidates(cols: &[Vec<f32>]) -> Array2<f32> {
        Array2::from_shape_fn((56, cols.len()), |(row, col)| cols[col][row])
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(1920, 1080), (640, 360));
        assert_eq!(fit_within(480, 640), (480, 640));
        assert_eq!(fit_within(100, 50), (640, 320));
    }

    #[test]
    fn test_process_result_filters_and_scales() {
        let arr = candidates(&[
            candidate(100., 100., 0.9, 0.8),
            candidate(300., 100., 0.3, 0.8),
        ]);
        let detections = process_result(arr.view(), 17, 0.5, 2., 2.).unwrap();

        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.confidence, 0.9);
        assert_eq!(d.keypoints.len(), 17);
        assert_eq!(d.keypoints[1], RawKeypoint::new(202., 180., 0.8));
        assert_eq!(d.bounds, Some(Rect::from_center(200., 200., 80., 120.)));
    }

    #[test]
    fn test_process_result_suppresses_overlaps() {
        let arr = candidates(&[
            candidate(100., 100., 0.7, 0.8),
            candidate(102., 101., 0.9, 0.8),
            candidate(101., 99., 0.8, 0.8),
            candidate(400., 100., 0.6, 0.8),
        ]);
        let detections = process_result(arr.view(), 17, 0.5, 1., 1.).unwrap();

        let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.6]);
    }

    #[test]
    fn test_process_result_shape_mismatch() {
        let arr = Array2::<f32>::zeros((20, 3));
        assert!(process_result(arr.view(), 17, 0.5, 1., 1.).is_err());
    }
}
