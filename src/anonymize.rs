use crate::detection::RawDetection;
use crate::draw;
use crate::keypoints::{KeypointSet, Vocabulary};
use crate::mask::MaskOptions;
use crate::ranking::{Detection, cap_face_count, deduplicate, rank_by_confidence};
use crate::shapes::rect::Rect;
use image::RgbImage;
use tracing::{debug, trace};

/// What happened to the faces of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Faces the detector reported
    pub detected: usize,
    /// Faces left after ranking, duplicate removal and the face cap
    pub selected: usize,
    /// Faces a mask was drawn over
    pub masked: usize,
}

/// Ranks the detections and applies duplicate removal and the face cap,
/// most confident face first.
pub fn select_faces(
    detections: &[RawDetection],
    vocabulary: &Vocabulary,
    options: &MaskOptions,
) -> Vec<KeypointSet> {
    let extracted = detections
        .iter()
        .map(|d| Detection {
            keypoints: vocabulary.extract(&d.keypoints, options.keypoint_threshold),
            confidence: d.confidence,
        })
        .collect();

    let mut faces = rank_by_confidence(extracted);

    let over_cap = options.max_faces.is_none_or(|max| faces.len() > max);
    if options.remove_duplicates && over_cap {
        let before = faces.len();
        faces = deduplicate(faces);
        trace!("Removed {} duplicate detections", before - faces.len());
    }

    cap_face_count(faces, options.max_faces)
}

/// Masks the eye region of every selected face, in place. Faces without
/// usable eyes are left as they are; a frame without detections is not
/// touched at all.
pub fn anonymize_frame(
    img: &mut RgbImage,
    detections: &[RawDetection],
    vocabulary: &Vocabulary,
    options: &MaskOptions,
) -> FrameReport {
    let mut report = FrameReport {
        detected: detections.len(),
        ..Default::default()
    };
    if detections.is_empty() {
        return report;
    }

    let faces = select_faces(detections, vocabulary, options);
    report.selected = faces.len();

    for (idx, face) in faces.iter().enumerate() {
        let Some(mask) = options.build(face) else {
            debug!("No mask for face {idx}, eyes missing or coincident");
            continue;
        };

        if draw::fill_mask(img, &mask, options.color) {
            trace!("Masked face {idx} within {:?}", Rect::from(mask));
            report.masked += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::RawKeypoint;
    use crate::mask::MaskShape;
    use crate::shapes::point::Point;
    use image::Rgb;

    const MASK: Rgb<u8> = Rgb([255, 0, 0]);
    const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

    fn detection(confidence: f32, le: (f32, f32), re: (f32, f32)) -> RawDetection {
        let mut keypoints = vec![RawKeypoint::new(0., 0., 0.); 17];
        keypoints[0] = RawKeypoint::new((le.0 + re.0) / 2., le.1 + 20., 0.9);
        keypoints[1] = RawKeypoint::new(le.0, le.1, 0.9);
        keypoints[2] = RawKeypoint::new(re.0, re.1, 0.9);
        RawDetection {
            keypoints,
            confidence,
            bounds: None,
        }
    }

    fn options() -> MaskOptions {
        MaskOptions {
            color: MASK,
            ..Default::default()
        }
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(400, 300, BACKGROUND)
    }

    #[test]
    fn test_single_face() {
        let mut img = frame();
        let detections = [detection(0.9, (140., 100.), (100., 100.))];
        let report = anonymize_frame(&mut img, &detections, &Vocabulary::coco(), &options());

        assert_eq!(
            report,
            FrameReport {
                detected: 1,
                selected: 1,
                masked: 1
            }
        );
        // box spans x 76..=164, y 84..=116
        assert_eq!(*img.get_pixel(120, 100), MASK);
        assert_eq!(*img.get_pixel(78, 86), MASK);
        assert_eq!(*img.get_pixel(162, 114), MASK);
        assert_eq!(*img.get_pixel(120, 130), BACKGROUND);
        assert_eq!(*img.get_pixel(60, 100), BACKGROUND);
    }

    #[test]
    fn test_no_detections_leaves_frame() {
        let mut img = frame();
        let report = anonymize_frame(&mut img, &[], &Vocabulary::coco(), &options());

        assert_eq!(report, FrameReport::default());
        assert_eq!(img, frame());
    }

    #[test]
    fn test_face_without_eyes_skipped() {
        let mut img = frame();
        let mut d = detection(0.9, (140., 100.), (100., 100.));
        d.keypoints[2].score = 0.1;

        let report = anonymize_frame(&mut img, &[d], &Vocabulary::coco(), &options());
        assert_eq!(report.detected, 1);
        assert_eq!(report.masked, 0);
        assert_eq!(img, frame());
    }

    #[test]
    fn test_coincident_eyes_skipped() {
        let mut img = frame();
        let detections = [
            detection(0.9, (50., 50.), (50., 50.)),
            detection(0.8, (340., 200.), (300., 200.)),
        ];

        let report = anonymize_frame(&mut img, &detections, &Vocabulary::coco(), &options());
        assert_eq!(report.selected, 2);
        assert_eq!(report.masked, 1);
        assert_eq!(*img.get_pixel(50, 50), BACKGROUND);
        assert_eq!(*img.get_pixel(320, 200), MASK);
    }

    #[test]
    fn test_duplicates_removed() {
        let detections = [
            detection(0.7, (143., 100.), (103., 101.)),
            detection(0.9, (140., 100.), (100., 100.)),
        ];
        let mut options = options();
        options.remove_duplicates = true;

        let faces = select_faces(&detections, &Vocabulary::coco(), &options);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].left_eye(), Some(Point::new(140., 100.)));

        // without the flag both stay
        options.remove_duplicates = false;
        assert_eq!(select_faces(&detections, &Vocabulary::coco(), &options).len(), 2);
    }

    #[test]
    fn test_dedupe_skipped_within_cap() {
        let detections = [
            detection(0.7, (143., 100.), (103., 101.)),
            detection(0.9, (140., 100.), (100., 100.)),
        ];
        let mut options = options();
        options.remove_duplicates = true;
        options.max_faces = Some(2);

        assert_eq!(select_faces(&detections, &Vocabulary::coco(), &options).len(), 2);
    }

    #[test]
    fn test_dedupe_then_cap() {
        let detections = [
            detection(0.5, (350., 100.), (310., 100.)),
            detection(0.7, (143., 100.), (103., 101.)),
            detection(0.9, (140., 100.), (100., 100.)),
            detection(0.6, (250., 200.), (210., 200.)),
        ];
        let mut options = options();
        options.remove_duplicates = true;
        options.max_faces = Some(2);

        let faces = select_faces(&detections, &Vocabulary::coco(), &options);
        let eyes: Vec<Point> = faces.iter().filter_map(|f| f.left_eye()).collect();
        assert_eq!(eyes, vec![Point::new(140., 100.), Point::new(250., 200.)]);
    }

    #[test]
    fn test_max_faces_keeps_most_confident() {
        let mut img = frame();
        let detections = [
            detection(0.6, (140., 100.), (100., 100.)),
            detection(0.8, (340., 200.), (300., 200.)),
        ];
        let mut options = options();
        options.max_faces = Some(1);

        let report = anonymize_frame(&mut img, &detections, &Vocabulary::coco(), &options);
        assert_eq!(report.masked, 1);
        assert_eq!(*img.get_pixel(320, 200), MASK);
        assert_eq!(*img.get_pixel(120, 100), BACKGROUND);
    }

    #[test]
    fn test_line_shape() {
        let mut img = frame();
        let detections = [detection(0.9, (140., 100.), (100., 100.))];
        let mut options = options();
        options.shape = MaskShape::Line { thickness: 2 };

        let report = anonymize_frame(&mut img, &detections, &Vocabulary::coco(), &options);
        assert_eq!(report.masked, 1);
        assert_eq!(*img.get_pixel(120, 100), MASK);
        assert_eq!(*img.get_pixel(120, 95), BACKGROUND);
        assert_eq!(*img.get_pixel(90, 100), BACKGROUND);
    }
}
