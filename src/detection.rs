use crate::keypoints::{RawKeypoint, Vocabulary};
use crate::shapes::rect::Rect;
use anyhow::Result;
use image::RgbImage;

pub mod pose;

pub use pose::{PoseDetector, PoseDetectorOptions};

/// One face as emitted by a detector, before any reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// In the order of the detector's vocabulary
    pub keypoints: Vec<RawKeypoint>,
    pub confidence: f32,
    pub bounds: Option<Rect>,
}

/// Finds faces and their landmarks in a frame.
///
/// Implementations filter out detections below their own confidence
/// threshold; everything returned is a candidate for masking.
pub trait KeypointDetector {
    fn vocabulary(&self) -> &Vocabulary;

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<RawDetection>>;
}
