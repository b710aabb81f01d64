//! Pointer input handling
//!
//! Turns press/move/release events into geometry updates. Events are handled
//! one at a time in arrival order; a move during a drag asks the caller for a
//! full redraw before the next event is read.

use tracing::debug;

use crate::geometry::{GeometryStore, Point, CORNER_LABELS};

/// A pointer event in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press(Point),
    Move(Point),
    Release,
    /// Pointer left the surface
    Leave,
}

/// What the caller has to do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEffect {
    None,
    /// Geometry changed: rewarp and redraw now
    Redraw,
}

#[derive(Debug, Default)]
pub struct PointerInputHandler;

impl PointerInputHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&mut self, store: &mut GeometryStore, event: PointerEvent) -> InputEffect {
        match event {
            PointerEvent::Press(point) => {
                if let Some(index) = store.hit_test(point) {
                    if store.set_active(index) {
                        debug!("Picked {} corner at ({}, {})", CORNER_LABELS[index], point.x, point.y);
                    }
                }
                InputEffect::None
            }
            PointerEvent::Move(point) => {
                if store.move_active(point) {
                    InputEffect::Redraw
                } else {
                    InputEffect::None
                }
            }
            PointerEvent::Release | PointerEvent::Leave => {
                if let Some(index) = store.active() {
                    debug!("Released {} corner", CORNER_LABELS[index]);
                }
                store.clear_active();
                InputEffect::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GeometryStore {
        GeometryStore::new(100, 100, 50)
    }

    #[test]
    fn test_press_on_corner_starts_drag() {
        let mut store = store();
        let mut handler = PointerInputHandler::new();
        let effect = handler.handle(&mut store, PointerEvent::Press(Point::new(3, 4)));
        assert_eq!(effect, InputEffect::None);
        assert_eq!(store.active(), Some(0));
    }

    #[test]
    fn test_press_outside_is_noop() {
        let mut store = store();
        let mut handler = PointerInputHandler::new();
        handler.handle(&mut store, PointerEvent::Press(Point::new(1000, 1000)));
        assert_eq!(store.active(), None);
        assert!(store.is_identity());
    }

    #[test]
    fn test_move_while_dragging_requests_redraw() {
        let mut store = store();
        let mut handler = PointerInputHandler::new();
        handler.handle(&mut store, PointerEvent::Press(Point::new(98, 98)));
        let effect = handler.handle(&mut store, PointerEvent::Move(Point::new(80, 70)));
        assert_eq!(effect, InputEffect::Redraw);
        assert_eq!(store.corners()[2], Point::new(80, 70));
    }

    #[test]
    fn test_move_while_idle_is_noop() {
        let mut store = store();
        let mut handler = PointerInputHandler::new();
        let effect = handler.handle(&mut store, PointerEvent::Move(Point::new(10, 10)));
        assert_eq!(effect, InputEffect::None);
        assert!(store.is_identity());
    }

    #[test]
    fn test_second_press_cannot_hijack_drag() {
        let mut store = store();
        let mut handler = PointerInputHandler::new();
        handler.handle(&mut store, PointerEvent::Press(Point::new(0, 0)));
        handler.handle(&mut store, PointerEvent::Press(Point::new(99, 99)));
        assert_eq!(store.active(), Some(0));
    }

    #[test]
    fn test_release_and_leave_end_drag() {
        let mut store = store();
        let mut handler = PointerInputHandler::new();

        handler.handle(&mut store, PointerEvent::Press(Point::new(0, 0)));
        assert_eq!(handler.handle(&mut store, PointerEvent::Release), InputEffect::None);
        assert_eq!(store.active(), None);

        handler.handle(&mut store, PointerEvent::Press(Point::new(99, 0)));
        handler.handle(&mut store, PointerEvent::Leave);
        assert_eq!(store.active(), None);

        // Moves after release no longer reach the corner
        handler.handle(&mut store, PointerEvent::Move(Point::new(50, 50)));
        assert!(store.is_identity());
    }
}
