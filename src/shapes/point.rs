use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pointi32 {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    pub fn norm(&self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: Point) -> f32 {
        (other - *self).norm()
    }

    /// (x, y) -> (y, -x)
    pub fn rotate_90(&self) -> Point {
        Point {
            x: self.y,
            y: -self.x,
        }
    }

    pub fn rotate_180(&self) -> Point {
        -*self
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Nearest integer pixel. None if either coordinate is not finite or
    /// does not fit in an i32.
    pub fn round(&self) -> Option<Pointi32> {
        if !self.is_finite() {
            return None;
        }

        let x = self.x.round();
        let y = self.y.round();
        let range = i32::MIN as f32..=i32::MAX as f32;
        if !range.contains(&x) || !range.contains(&y) {
            return None;
        }

        Some(Pointi32::new(x as i32, y as i32))
    }

    /// True if `other` lies inside the box of half-size `tolerance` centred
    /// on this point, bounds included.
    pub fn within_box(&self, other: Point, tolerance: f32) -> bool {
        (other.x - self.x).abs() <= tolerance && (other.y - self.y).abs() <= tolerance
    }
}

impl Pointi32 {
    pub fn new(x: i32, y: i32) -> Pointi32 {
        Pointi32 { x, y }
    }
}

impl From<Pointi32> for Point {
    fn from(p: Pointi32) -> Point {
        Point::new(p.x as f32, p.y as f32)
    }
}

impl From<Pointi32> for imageproc::point::Point<i32> {
    fn from(p: Pointi32) -> imageproc::point::Point<i32> {
        imageproc::point::Point::new(p.x, p.y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, o: Point) -> Point {
        Point::new(self.x + o.x, self.y + o.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, o: Point) -> Point {
        Point::new(self.x - o.x, self.y - o.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, s: f32) -> Point {
        Point::new(self.x * s, self.y * s)
    }
}

impl Div<f32> for Point {
    type Output = Point;

    fn div(self, s: f32) -> Point {
        Point::new(self.x / s, self.y / s)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Treats `p1 -> p2` as a directed segment and moves `p1` backwards and `p2`
/// forwards by `distance` along it. A negative distance shrinks the segment.
///
/// Returns None when the segment has no direction (`p1 == p2`) or the result
/// is not finite.
pub fn extend_segment(p1: Point, p2: Point, distance: f32) -> Option<(Point, Point)> {
    let v = p2 - p1;
    let norm = v.norm();
    if !norm.is_finite() || norm == 0. {
        return None;
    }

    let offset = v / norm * distance;
    let p1 = p1 - offset;
    let p2 = p2 + offset;

    if p1.is_finite() && p2.is_finite() {
        Some((p1, p2))
    } else {
        None
    }
}
