/// An axis-aligned face rectangle in frame pixel coordinates.
///
/// `score` is the detector's confidence that the rectangle contains a face;
/// it is unrelated to identity match confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f64,
}

impl DetectionRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: 1.0,
        }
    }

    /// Builds a region from float corner coordinates, clamped to the frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn from_corners(
        (x1, y1, x2, y2): (f64, f64, f64, f64),
        score: f64,
        frame_w: u32,
        frame_h: u32,
    ) -> Option<Self> {
        let left = x1.round().max(0.0) as i32;
        let top = y1.round().max(0.0) as i32;
        let right = (x2.round() as i32).min(frame_w as i32);
        let bottom = (y2.round() as i32).min(frame_h as i32);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
            score,
        })
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Intersection of this region with a `frame_w` x `frame_h` frame.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<DetectionRegion> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.right().min(frame_w as i32);
        let bottom = self.bottom().min(frame_h as i32);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
            score: self.score,
        })
    }

    pub fn iou(&self, other: &DetectionRegion) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.area() as f64;
        let area_b = other.area() as f64;
        inter / (area_a + area_b - inter)
    }
}
