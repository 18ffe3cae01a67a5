use super::point::{Point, Pointi32};
use super::rect::Rect;

/// Closed quadrilateral A -> B -> C -> D -> A in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quad {
    pub points: [Pointi32; 4],
}

impl Quad {
    pub fn new(points: [Pointi32; 4]) -> Self {
        Self { points }
    }

    pub fn centroid(&self) -> Point {
        let sum = self
            .points
            .iter()
            .fold(Point::default(), |acc, p| acc + Point::from(*p));
        sum / 4.
    }

    /// Length of the A-B edge, which runs along the eye line.
    pub fn long_extent(&self) -> f32 {
        Point::from(self.points[0]).distance(self.points[1].into())
    }

    /// Length of the A-D edge, perpendicular to the eye line.
    pub fn short_extent(&self) -> f32 {
        Point::from(self.points[0]).distance(self.points[3].into())
    }

    /// True if every turn along A -> B -> C -> D -> A goes the same way and
    /// none of them is flat. Such a quad is simple and has non-zero area.
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.;
        for i in 0..4 {
            let a = self.points[i];
            let b = self.points[(i + 1) % 4];
            let c = self.points[(i + 2) % 4];
            let turn = robust::orient2d(
                robust::Coord { x: a.x, y: a.y },
                robust::Coord { x: b.x, y: b.y },
                robust::Coord { x: c.x, y: c.y },
            );

            if turn == 0. {
                return false;
            }
            if sign == 0. {
                sign = turn.signum();
            } else if turn.signum() != sign {
                return false;
            }
        }

        true
    }

    pub fn to_polygon(&self) -> Vec<imageproc::point::Point<i32>> {
        self.points.iter().map(|p| (*p).into()).collect()
    }
}

impl From<Quad> for Rect {
    fn from(q: Quad) -> Rect {
        let min_x = q.points.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = q.points.iter().map(|p| p.x).max().unwrap_or(0);
        let min_y = q.points.iter().map(|p| p.y).min().unwrap_or(0);
        let max_y = q.points.iter().map(|p| p.y).max().unwrap_or(0);

        Rect::from_tl(
            min_x as f32,
            min_y as f32,
            (max_x - min_x) as f32,
            (max_y - min_y) as f32,
        )
    }
}
