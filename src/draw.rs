use crate::detection::RawDetection;
use crate::keypoints::Vocabulary;
use crate::shapes::quad::Quad;
use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing;
use tracing::trace;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const EYE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LABEL_SCALE: f32 = 18.;

/// Fills the mask on the frame. Returns false, leaving the frame alone, if
/// the quad has collapsed below a drawable polygon.
pub fn fill_mask(img: &mut RgbImage, mask: &Quad, color: Rgb<u8>) -> bool {
    if !mask.is_convex() {
        trace!("Skipping degenerate mask {mask:?}");
        return false;
    }

    drawing::draw_polygon_mut(img, &mask.to_polygon(), color);
    true
}

/// Boxes, visible keypoints and, with a font, confidence of each detection.
pub fn draw_detections(
    img: &mut RgbImage,
    detections: &[RawDetection],
    vocabulary: &Vocabulary,
    min_visibility: f32,
    font: Option<&FontVec>,
) {
    for d in detections {
        if let Some(bounds) = d.bounds {
            drawing::draw_hollow_rect_mut(img, bounds.into(), BOX_COLOR);

            if let Some(font) = font {
                drawing::draw_text_mut(
                    img,
                    BOX_COLOR,
                    bounds.left().round() as i32,
                    (bounds.top() - LABEL_SCALE).round() as i32,
                    LABEL_SCALE,
                    font,
                    &format!("{:.2}", d.confidence),
                );
            }
        }

        let keypoints = vocabulary.extract(&d.keypoints, min_visibility);
        for (idx, p) in keypoints.visible() {
            let color = if keypoints.is_eye(idx) {
                EYE_COLOR
            } else {
                KEYPOINT_COLOR
            };
            let Some(p) = p.round() else {
                continue;
            };
            trace!(
                "Keypoint {} at ({}, {})",
                vocabulary.name(idx).unwrap_or("?"),
                p.x,
                p.y
            );
            drawing::draw_filled_circle_mut(img, (p.x, p.y), 3, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::RawKeypoint;
    use crate::shapes::point::Pointi32;
    use crate::shapes::rect::Rect;

    fn quad(points: [(i32, i32); 4]) -> Quad {
        Quad::new(points.map(|(x, y)| Pointi32::new(x, y)))
    }

    #[test]
    fn test_fill_mask() {
        let mut img = RgbImage::new(40, 40);
        let color = Rgb([10, 20, 30]);
        let mask = quad([(5, 25), (30, 25), (30, 10), (5, 10)]);

        assert!(fill_mask(&mut img, &mask, color));
        assert_eq!(*img.get_pixel(17, 17), color);
        assert_eq!(*img.get_pixel(5, 10), color);
        assert_eq!(*img.get_pixel(2, 2), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(35, 17), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_fill_mask_clips_to_frame() {
        let mut img = RgbImage::new(20, 20);
        let mask = quad([(-30, 40), (50, 40), (50, -10), (-30, -10)]);

        assert!(fill_mask(&mut img, &mask, Rgb([255, 255, 255])));
        assert!(img.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_fill_mask_degenerate() {
        let mut img = RgbImage::new(10, 10);
        let mask = quad([(1, 1), (1, 1), (1, 1), (1, 1)]);

        assert!(!fill_mask(&mut img, &mask, Rgb([255, 255, 255])));
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_draw_detections() {
        let mut img = RgbImage::new(100, 100);
        let mut keypoints = vec![RawKeypoint::new(0., 0., 0.); 17];
        keypoints[1] = RawKeypoint::new(60., 40., 0.9);
        keypoints[2] = RawKeypoint::new(40., 40., 0.9);
        keypoints[0] = RawKeypoint::new(50., 55., 0.9);

        let detections = [RawDetection {
            keypoints,
            confidence: 0.9,
            bounds: Some(Rect::from_tl(20., 20., 60., 60.)),
        }];
        draw_detections(&mut img, &detections, &Vocabulary::coco(), 0.5, None);

        assert_eq!(*img.get_pixel(60, 40), EYE_COLOR);
        assert_eq!(*img.get_pixel(50, 55), KEYPOINT_COLOR);
        assert_eq!(*img.get_pixel(20, 50), BOX_COLOR);
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_eye_color_follows_index() {
        let mut img = RgbImage::new(100, 100);
        let mut keypoints = vec![RawKeypoint::new(0., 0., 0.); 17];
        // left ear drawn after, and on top of, the left eye
        keypoints[1] = RawKeypoint::new(30., 30., 0.9);
        keypoints[2] = RawKeypoint::new(70., 30., 0.9);
        keypoints[3] = RawKeypoint::new(30., 30., 0.9);

        let detections = [RawDetection {
            keypoints,
            confidence: 0.9,
            bounds: None,
        }];
        draw_detections(&mut img, &detections, &Vocabulary::coco(), 0.5, None);

        assert_eq!(*img.get_pixel(30, 30), KEYPOINT_COLOR);
        assert_eq!(*img.get_pixel(70, 30), EYE_COLOR);
    }
}
