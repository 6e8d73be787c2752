//! Drag-to-select state of the selection overlay

use crate::region::{Point, Region};

/// Tracks one left-button drag on the overlay.
///
/// Points are overlay-local; `origin` is the overlay's position on the root
/// window and is added back when the final region is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionState {
    origin: Point,
    start: Option<Point>,
    end: Point,
}

impl SelectionState {
    pub fn new(origin: Point) -> Self {
        Self { origin, start: None, end: Point::default() }
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    pub fn press(&mut self, local: Point) {
        self.start = Some(local);
        self.end = local;
    }

    /// Returns true when the visible rectangle changed and needs a redraw
    pub fn motion(&mut self, local: Point) -> bool {
        if self.start.is_none() || self.end == local {
            return false;
        }
        self.end = local;
        true
    }

    /// Finish the drag. Yields the selected region in global coordinates,
    /// or None when nothing with a positive area was selected.
    pub fn release(&mut self, local: Point) -> Option<Region> {
        let start = self.start.take()?;
        self.end = local;
        let rect = Region::from_corners(start, local);
        (!rect.is_empty()).then(|| rect.translated(self.origin))
    }

    /// Rectangle being dragged, in overlay-local coordinates
    pub fn current_rect(&self) -> Option<Region> {
        self.start.map(|start| Region::from_corners(start, self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_converts_to_global() {
        let mut selection = SelectionState::new(Point::new(1920, 0));
        selection.press(Point::new(100, 100));
        assert!(selection.motion(Point::new(300, 250)));
        let region = selection.release(Point::new(500, 400));
        assert_eq!(region, Some(Region::new(2020, 100, 400, 300)));
        assert!(!selection.is_dragging());
    }

    #[test]
    fn test_reverse_drag_is_normalized() {
        let mut selection = SelectionState::new(Point::default());
        selection.press(Point::new(500, 400));
        let region = selection.release(Point::new(100, 100));
        assert_eq!(region, Some(Region::new(100, 100, 400, 300)));
    }

    #[test]
    fn test_click_without_drag_selects_nothing() {
        let mut selection = SelectionState::new(Point::default());
        selection.press(Point::new(42, 42));
        assert_eq!(selection.release(Point::new(42, 42)), None);
    }

    #[test]
    fn test_zero_height_drag_selects_nothing() {
        let mut selection = SelectionState::new(Point::default());
        selection.press(Point::new(10, 42));
        assert_eq!(selection.release(Point::new(300, 42)), None);
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut selection = SelectionState::new(Point::default());
        assert_eq!(selection.release(Point::new(10, 10)), None);
    }

    #[test]
    fn test_motion_only_redraws_while_dragging() {
        let mut selection = SelectionState::new(Point::default());
        assert!(!selection.motion(Point::new(5, 5)));
        assert_eq!(selection.current_rect(), None);

        selection.press(Point::new(0, 0));
        assert!(selection.motion(Point::new(5, 5)));
        assert!(!selection.motion(Point::new(5, 5)));
        assert_eq!(selection.current_rect(), Some(Region::new(0, 0, 5, 5)));
    }
}
