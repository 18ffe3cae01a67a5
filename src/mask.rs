use crate::keypoints::KeypointSet;
use crate::shapes::point::{Point, extend_segment};
use crate::shapes::quad::Quad;
use anyhow::{Error, Result};
use image::Rgb;

/// Share of the eye distance kept on each side of the eye line, per unit of
/// height scale.
const HEIGHT_FACTOR: f32 = 0.4;
/// Share of the eye distance added beyond each eye, per unit of width scale.
const WIDTH_FACTOR: f32 = 0.6;

/// Independent multipliers for the mask extent along (`width`) and across
/// (`height`) the eye line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskScale {
    width: f32,
    height: f32,
}

impl Default for MaskScale {
    fn default() -> Self {
        Self {
            width: 1.,
            height: 1.,
        }
    }
}

impl MaskScale {
    pub fn new(width: f32, height: f32) -> Result<MaskScale> {
        for (name, v) in [("width", width), ("height", height)] {
            if !(v.is_finite() && v > 0.) {
                return Err(Error::msg(format!(
                    "Mask {name} scale must be a positive number, got {v}"
                )));
            }
        }

        Ok(MaskScale { width, height })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskShape {
    /// Oriented box over both eyes
    Rectangle,
    /// Straight line between the eyes
    Line { thickness: u32 },
}

#[derive(Debug, Clone)]
pub struct MaskOptions {
    pub scale: MaskScale,
    /// In the frame's channel order
    pub color: Rgb<u8>,
    pub shape: MaskShape,
    pub remove_duplicates: bool,
    pub max_faces: Option<usize>,
    /// Landmarks scoring below this are treated as not visible
    pub keypoint_threshold: f32,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            scale: MaskScale::default(),
            color: Rgb([0, 0, 0]),
            shape: MaskShape::Rectangle,
            remove_duplicates: false,
            max_faces: None,
            keypoint_threshold: 0.5,
        }
    }
}

impl MaskOptions {
    pub fn build(&self, keypoints: &KeypointSet) -> Option<Quad> {
        match self.shape {
            MaskShape::Rectangle => build_mask(keypoints, self.scale),
            MaskShape::Line { thickness } => build_eye_line(keypoints, thickness),
        }
    }
}

/// Box covering the eye region, oriented with the eye line.
///
/// ```text
/// A ---------- B
/// |  re    le  |
/// D ---------- C
/// ```
///
/// The long edges run parallel to the eyes and reach `0.6 * width` eye
/// distances past each eye, the short edges reach `0.4 * height` eye
/// distances to each side of the eye line. Returns None when an eye is
/// missing or the eyes coincide.
pub fn build_mask(keypoints: &KeypointSet, scale: MaskScale) -> Option<Quad> {
    let re = keypoints.right_eye()?;
    let le = keypoints.left_eye()?;
    let eyes_distance = re.distance(le);

    // mask height
    let reduced = eyes_distance - eyes_distance * HEIGHT_FACTOR * scale.height;
    let (shrunk_re, _) = extend_segment(re, le, -reduced)?;
    let perp_90 = (le - shrunk_re).rotate_90();
    let perp_180 = perp_90.rotate_180();

    // mask width
    let extended = eyes_distance * WIDTH_FACTOR * scale.width;
    let (re, le) = extend_segment(re, le, extended)?;

    corners([perp_180 + re, perp_180 + le, perp_90 + le, perp_90 + re])
}

/// Band of `thickness` pixels centred on the segment between the eyes.
pub fn build_eye_line(keypoints: &KeypointSet, thickness: u32) -> Option<Quad> {
    let re = keypoints.right_eye()?;
    let le = keypoints.left_eye()?;
    let direction = le - re;
    let norm = direction.norm();
    if !norm.is_finite() || norm == 0. {
        return None;
    }

    let half = (direction / norm).rotate_90() * (thickness.max(1) as f32 / 2.);
    corners([re - half, le - half, le + half, re + half])
}

fn corners(points: [Point; 4]) -> Option<Quad> {
    let [a, b, c, d] = points;
    Some(Quad::new([a.round()?, b.round()?, c.round()?, d.round()?]))
}
