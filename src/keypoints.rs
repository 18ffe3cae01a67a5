use crate::shapes::point::Point;
use anyhow::{Error, Result};

pub const LEFT_EYE: &str = "left_eye";
pub const RIGHT_EYE: &str = "right_eye";

/// Keypoint names of COCO person keypoint models, in output order.
pub const COCO_KEYPOINTS: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Ordered landmark names emitted by a detector. Construction fails if the
/// eyes are not part of it, so lookups afterwards are plain indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    names: Vec<String>,
    left_eye: usize,
    right_eye: usize,
}

impl Vocabulary {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Vocabulary> {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let position = |wanted: &str| {
            names.iter().position(|n| n == wanted).ok_or_else(|| {
                Error::msg(format!(
                    "Keypoint vocabulary {names:?} has no \"{wanted}\" landmark"
                ))
            })
        };

        let left_eye = position(LEFT_EYE)?;
        let right_eye = position(RIGHT_EYE)?;

        Ok(Vocabulary {
            names,
            left_eye,
            right_eye,
        })
    }

    pub fn coco() -> Vocabulary {
        Vocabulary {
            names: COCO_KEYPOINTS.iter().map(|n| n.to_string()).collect(),
            left_eye: 1,
            right_eye: 2,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(|n| n.as_str())
    }

    /// Maps raw keypoints (in vocabulary order) to a KeypointSet. Keypoints
    /// past the end of the vocabulary are ignored, ones with a visibility
    /// score below `min_visibility` or non-finite coordinates are absent.
    pub fn extract(&self, raw: &[RawKeypoint], min_visibility: f32) -> KeypointSet {
        let mut points = vec![None; self.names.len()];
        for (slot, kp) in points.iter_mut().zip(raw) {
            let p = Point::new(kp.x, kp.y);
            if kp.score >= min_visibility && p.is_finite() {
                *slot = Some(p);
            }
        }

        KeypointSet {
            points,
            left_eye: self.left_eye,
            right_eye: self.right_eye,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawKeypoint {
    pub x: f32,
    pub y: f32,
    /// Visibility / confidence of this single landmark
    pub score: f32,
}

impl RawKeypoint {
    pub fn new(x: f32, y: f32, score: f32) -> RawKeypoint {
        RawKeypoint { x, y, score }
    }
}

/// Visible landmarks of one detected face, indexed by vocabulary position.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    points: Vec<Option<Point>>,
    left_eye: usize,
    right_eye: usize,
}

impl KeypointSet {
    pub fn get(&self, idx: usize) -> Option<Point> {
        self.points.get(idx).copied().flatten()
    }

    pub fn left_eye(&self) -> Option<Point> {
        self.get(self.left_eye)
    }

    pub fn right_eye(&self) -> Option<Point> {
        self.get(self.right_eye)
    }

    pub fn is_eye(&self, idx: usize) -> bool {
        idx == self.left_eye || idx == self.right_eye
    }

    /// (left_eye, right_eye), only if both are visible.
    pub fn eyes(&self) -> Option<(Point, Point)> {
        Some((self.left_eye()?, self.right_eye()?))
    }

    pub fn visible(&self) -> impl Iterator<Item = (usize, Point)> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.map(|p| (idx, p)))
    }
}

/// Shorthand for building a set with only eyes, used by tests across the crate.
#[cfg(test)]
pub fn eyes_only(left_eye: Option<(f32, f32)>, right_eye: Option<(f32, f32)>) -> KeypointSet {
    let hidden = RawKeypoint::new(0., 0., 0.);
    let raw: Vec<RawKeypoint> = (0..COCO_KEYPOINTS.len())
        .map(|idx| {
            let eye = match idx {
                1 => left_eye,
                2 => right_eye,
                _ => None,
            };
            eye.map_or(hidden, |(x, y)| RawKeypoint::new(x, y, 1.))
        })
        .collect();

    Vocabulary::coco().extract(&raw, 0.5)
}
