//! Corner geometry and drag state
//!
//! Holds the four corners of the target quadrilateral in image pixel space,
//! always ordered top-left, top-right, bottom-right, bottom-left. The
//! transform engine relies on that order, so dragging replaces a corner in
//! place and never reorders them.

/// A point in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_f64(self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

/// Corner names, indexed the same way as the corner array
pub const CORNER_LABELS: [&str; 4] = ["Top Left", "Top Right", "Bottom Right", "Bottom Left"];

/// Which corner, if any, is being dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(usize),
}

/// The image's own corners: (0,0), (w-1,0), (w-1,h-1), (0,h-1)
pub fn reference_corners(width: u32, height: u32) -> [Point; 4] {
    let right = width.saturating_sub(1) as i32;
    let bottom = height.saturating_sub(1) as i32;
    [
        Point::new(0, 0),
        Point::new(right, 0),
        Point::new(right, bottom),
        Point::new(0, bottom),
    ]
}

#[derive(Debug, Clone)]
pub struct GeometryStore {
    corners: [Point; 4],
    drag: DragState,
    hit_radius: i32,
    width: u32,
    height: u32,
}

impl GeometryStore {
    /// Start with the identity quadrilateral for an image of the given size
    pub fn new(width: u32, height: u32, hit_radius: i32) -> Self {
        Self {
            corners: reference_corners(width, height),
            drag: DragState::Idle,
            hit_radius,
            width,
            height,
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        self.corners
    }

    /// Index of the corner being dragged
    pub fn active(&self) -> Option<usize> {
        match self.drag {
            DragState::Idle => None,
            DragState::Dragging(index) => Some(index),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active().is_some()
    }

    /// First corner (in fixed order) whose pick box contains `point`
    pub fn hit_test(&self, point: Point) -> Option<usize> {
        let r = self.hit_radius as i64;
        self.corners.iter().position(|corner| {
            let dx = (point.x as i64 - corner.x as i64).abs();
            let dy = (point.y as i64 - corner.y as i64).abs();
            dx < r && dy < r
        })
    }

    /// Start dragging `index`. Ignored while another drag is in flight.
    pub fn set_active(&mut self, index: usize) -> bool {
        if index >= self.corners.len() || self.is_dragging() {
            return false;
        }
        self.drag = DragState::Dragging(index);
        true
    }

    pub fn clear_active(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Move the dragged corner to `point`. No-op while idle.
    ///
    /// Self-intersecting or collapsed quadrilaterals are accepted as-is.
    pub fn move_active(&mut self, point: Point) -> bool {
        match self.drag {
            DragState::Dragging(index) => {
                self.corners[index] = point;
                true
            }
            DragState::Idle => false,
        }
    }

    /// Put every corner back on the image's own corners and drop any drag
    pub fn reset(&mut self) {
        self.corners = reference_corners(self.width, self.height);
        self.drag = DragState::Idle;
    }

    pub fn is_identity(&self) -> bool {
        self.corners == reference_corners(self.width, self.height)
    }
}
