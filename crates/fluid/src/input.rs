use crate::types::PointerSample;

/// Rescales a horizontal pointer delta on portrait surfaces.
pub fn correct_delta_x(delta: f32, aspect: f32) -> f32 {
    if aspect < 1.0 {
        delta * aspect
    } else {
        delta
    }
}

/// Rescales a vertical pointer delta on landscape surfaces.
pub fn correct_delta_y(delta: f32, aspect: f32) -> f32 {
    if aspect > 1.0 {
        delta / aspect
    } else {
        delta
    }
}

/// Folds raw cursor positions into a [`PointerSample`].
///
/// Positions arrive in physical pixels with the origin at the top-left; the
/// sample stores them normalised with the origin at the bottom-left.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerTracker {
    last: Option<[f32; 2]>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cursor position on a `width` x `height` surface.
    pub fn moved_to(
        &mut self,
        px: f64,
        py: f64,
        width: u32,
        height: u32,
        sample: &mut PointerSample,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let aspect = width as f32 / height as f32;
        let x = (px / width as f64) as f32;
        let y = 1.0 - (py / height as f64) as f32;

        if let Some([lx, ly]) = self.last {
            let dx = correct_delta_x(x - lx, aspect);
            let dy = correct_delta_y(y - ly, aspect);
            // Accumulate so several events within one tick become one impulse.
            if sample.moved {
                sample.dx += dx;
                sample.dy += dy;
            } else {
                sample.dx = dx;
                sample.dy = dy;
            }
            sample.moved |= dx.abs() > 0.0 || dy.abs() > 0.0;
        }
        sample.x = x;
        sample.y = y;
        self.last = Some([x, y]);
    }

    /// Forgets the last position so re-entry does not produce a jump.
    pub fn left(&mut self) {
        self.last = None;
    }
}

/// Follows the first finger on the surface and ignores the rest.
///
/// Every touch id feeds the same [`PointerTracker`], so only one of them may
/// drive it at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryTouch {
    active: Option<u64>,
}

impl PrimaryTouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A finger went down; returns true when it becomes the primary one.
    pub fn begin(&mut self, id: u64) -> bool {
        match self.active {
            None => {
                self.active = Some(id);
                true
            }
            Some(active) => active == id,
        }
    }

    pub fn is_primary(&self, id: u64) -> bool {
        self.active == Some(id)
    }

    /// A finger lifted; returns true when it was the primary one.
    pub fn end(&mut self, id: u64) -> bool {
        if self.active == Some(id) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_are_aspect_corrected() {
        assert_eq!(correct_delta_x(0.2, 0.5), 0.1);
        assert_eq!(correct_delta_x(0.2, 2.0), 0.2);
        assert_eq!(correct_delta_y(0.2, 2.0), 0.1);
        assert_eq!(correct_delta_y(0.2, 0.5), 0.2);
    }

    #[test]
    fn first_position_is_not_a_move() {
        let mut tracker = PointerTracker::new();
        let mut sample = PointerSample::default();
        tracker.moved_to(50.0, 25.0, 100, 100, &mut sample);
        assert!(!sample.moved);
        assert!((sample.x - 0.5).abs() < 1e-6);
        assert!((sample.y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn movement_flips_vertical_axis() {
        let mut tracker = PointerTracker::new();
        let mut sample = PointerSample::default();
        tracker.moved_to(50.0, 50.0, 100, 100, &mut sample);
        tracker.moved_to(60.0, 40.0, 100, 100, &mut sample);
        assert!(sample.moved);
        assert!((sample.dx - 0.1).abs() < 1e-6);
        assert!((sample.dy - 0.1).abs() < 1e-6);
    }

    #[test]
    fn events_within_a_tick_accumulate() {
        let mut tracker = PointerTracker::new();
        let mut sample = PointerSample::default();
        tracker.moved_to(0.0, 0.0, 200, 100, &mut sample);
        tracker.moved_to(20.0, 0.0, 200, 100, &mut sample);
        tracker.moved_to(40.0, 0.0, 200, 100, &mut sample);
        assert!((sample.dx - 0.2).abs() < 1e-6);
        assert_eq!(sample.dy, 0.0);
    }

    #[test]
    fn leaving_resets_history() {
        let mut tracker = PointerTracker::new();
        let mut sample = PointerSample::default();
        tracker.moved_to(10.0, 10.0, 100, 100, &mut sample);
        tracker.left();
        tracker.moved_to(90.0, 90.0, 100, 100, &mut sample);
        assert!(!sample.moved);
    }

    #[test]
    fn second_finger_does_not_steer_the_pointer() {
        let mut touch = PrimaryTouch::new();
        let mut tracker = PointerTracker::new();
        let mut sample = PointerSample::default();

        assert!(touch.begin(1));
        tracker.moved_to(10.0, 50.0, 100, 100, &mut sample);
        assert!(!touch.begin(2));
        assert!(!touch.is_primary(2));
        assert!(touch.is_primary(1));
        tracker.moved_to(12.0, 50.0, 100, 100, &mut sample);
        assert!((sample.dx - 0.02).abs() < 1e-6);

        assert!(!touch.end(2));
        assert!(touch.end(1));
        assert!(touch.begin(2));
    }
}
