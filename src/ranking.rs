use crate::keypoints::KeypointSet;
use std::cmp::Ordering;
use tracing::trace;

/// Half-size, in pixels, of the box around an eye within which another
/// detection's matching eye makes it a duplicate.
pub const DUPLICATE_TOLERANCE: f32 = 10.;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub keypoints: KeypointSet,
    pub confidence: f32,
}

/// Most confident first. The sort is stable so equal scores keep detector
/// order; NaN scores go last.
pub fn rank_by_confidence(mut detections: Vec<Detection>) -> Vec<KeypointSet> {
    detections.sort_by(|a, b| compare_confidence(b.confidence, a.confidence));
    detections.into_iter().map(|d| d.keypoints).collect()
}

fn compare_confidence(a: f32, b: f32) -> Ordering {
    let key = |c: f32| if c.is_nan() { f32::NEG_INFINITY } else { c };
    key(a).total_cmp(&key(b))
}

/// Greedy duplicate removal over a confidence ordered list.
///
/// Each kept face claims every later face whose left eye sits in the
/// tolerance box around its left eye, or whose right eye sits in the box
/// around its right eye. Faces without both eyes are never kept.
pub fn deduplicate(ranked: Vec<KeypointSet>) -> Vec<KeypointSet> {
    let keep = unique_faces(&ranked);
    ranked
        .into_iter()
        .zip(keep)
        .filter_map(|(kps, keep)| keep.then_some(kps))
        .collect()
}

fn unique_faces(ranked: &[KeypointSet]) -> Vec<bool> {
    let mut alive = vec![true; ranked.len()];
    let mut keep = vec![false; ranked.len()];

    for (idx, kps) in ranked.iter().enumerate() {
        if !alive[idx] {
            continue;
        }
        let Some((le, re)) = kps.eyes() else {
            trace!("Dropping detection {idx} without both eyes");
            continue;
        };
        keep[idx] = true;

        for (other_idx, other) in ranked.iter().enumerate().skip(idx + 1) {
            if !alive[other_idx] {
                continue;
            }
            if let Some((other_le, other_re)) = other.eyes() {
                if le.within_box(other_le, DUPLICATE_TOLERANCE)
                    || re.within_box(other_re, DUPLICATE_TOLERANCE)
                {
                    trace!("Detection {other_idx} duplicates detection {idx}");
                    alive[other_idx] = false;
                }
            }
        }
    }

    keep
}

/// Keeps the first `max_faces` entries, if set.
pub fn cap_face_count(mut faces: Vec<KeypointSet>, max_faces: Option<usize>) -> Vec<KeypointSet> {
    if let Some(max) = max_faces {
        faces.truncate(max);
    }
    faces
}
