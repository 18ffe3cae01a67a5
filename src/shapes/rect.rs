#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rect {
    // centerpoint
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl From<Rect> for imageproc::rect::Rect {
    fn from(r: Rect) -> imageproc::rect::Rect {
        imageproc::rect::Rect::at(r.left().round() as i32, r.top().round() as i32)
            .of_size(r.w.round().max(1.) as u32, r.h.round().max(1.) as u32)
    }
}

impl Rect {
    pub fn left(&self) -> f32 {
        self.x - self.w / 2.
    }
    pub fn right(&self) -> f32 {
        self.x + self.w / 2.
    }
    pub fn top(&self) -> f32 {
        self.y - self.h / 2.
    }
    pub fn bottom(&self) -> f32 {
        self.y + self.h / 2.
    }
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Rect {
        Rect { x: xc, y: yc, w, h }
    }

    pub fn from_tl(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect {
            x: x + w / 2.,
            y: y + h / 2.,
            w,
            h,
        }
    }

    pub fn scale(&mut self, scale_x: f32, scale_y: f32) -> Rect {
        self.x *= scale_x;
        self.y *= scale_y;
        self.w *= scale_x;
        self.h *= scale_y;

        *self
    }

    pub fn overlap_pct(&self, other: &Rect) -> f32 {
        let x_min = self.left().max(other.left());
        let x_max = self.right().min(other.right());
        let y_min = self.top().max(other.top());
        let y_max = self.bottom().min(other.bottom());

        let overlap_area = if x_min < x_max && y_min < y_max {
            (x_max - x_min) * (y_max - y_min)
        } else {
            0.
        };

        let area_delta = self.area() + other.area() - overlap_area;

        if area_delta > 0. {
            overlap_area / area_delta * 100.
        } else {
            0.
        }
    }
}
