use serde::Serialize;

use crate::map::position::MapPosition;
use crate::map::viewport::{PlotRect, Viewport};

/// The pointer gesture currently owning the map. Dragging the user's point
/// and panning the background are mutually exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Idle,
    Dragging { live: MapPosition, moved: bool },
    Panning { last_x: f64, last_y: f64 },
}

/// What a pointer release means to the caller.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GestureOutcome {
    /// Nothing was in progress.
    None,
    /// The own point was pressed and released without moving.
    Select,
    /// The own point was dragged; request a variation toward `target`.
    Variation { target: MapPosition },
    /// A background pan finished.
    PanEnd,
}

/// Viewport plus the pointer state machine driving it.
#[derive(Clone, Debug)]
pub struct MapView {
    pub viewport: Viewport,
    pub plot: PlotRect,
    gesture: Gesture,
}

impl MapView {
    pub fn new(plot: PlotRect) -> Self {
        MapView {
            viewport: Viewport::default(),
            plot,
            gesture: Gesture::Idle,
        }
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    pub fn set_plot(&mut self, plot: PlotRect) {
        self.plot = plot;
    }

    /// Whether a pointer at `(px, py)` lands within `radius_px` of `point`.
    pub fn hit_test(&self, px: f64, py: f64, point: MapPosition, radius_px: f64) -> bool {
        let (sx, sy) = self.viewport.data_to_screen(point.clamped(), &self.plot);
        let (dx, dy) = (px - sx, py - sy);
        dx * dx + dy * dy <= radius_px * radius_px
    }

    /// Start a gesture. `own_point` carries the user's current position when
    /// the press landed on it; otherwise the press starts a pan. Returns
    /// false if another gesture is still active.
    pub fn pointer_down(&mut self, px: f64, py: f64, own_point: Option<MapPosition>) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.gesture = match own_point {
            Some(current) => Gesture::Dragging {
                live: current.clamped(),
                moved: false,
            },
            None => Gesture::Panning {
                last_x: px,
                last_y: py,
            },
        };
        true
    }

    /// Track the pointer. Returns the live drag position while dragging.
    pub fn pointer_move(&mut self, px: f64, py: f64) -> Option<MapPosition> {
        match self.gesture {
            Gesture::Idle => None,
            Gesture::Dragging { .. } => {
                let live = self.viewport.screen_to_data(px, py, &self.plot).clamped();
                self.gesture = Gesture::Dragging { live, moved: true };
                Some(live)
            }
            Gesture::Panning { last_x, last_y } => {
                self.viewport
                    .pan(px - last_x, py - last_y, self.plot.width, self.plot.height);
                self.gesture = Gesture::Panning {
                    last_x: px,
                    last_y: py,
                };
                None
            }
        }
    }

    pub fn pointer_up(&mut self) -> GestureOutcome {
        let outcome = match self.gesture {
            Gesture::Idle => GestureOutcome::None,
            Gesture::Dragging { live, moved: true } => GestureOutcome::Variation { target: live },
            Gesture::Dragging { moved: false, .. } => GestureOutcome::Select,
            Gesture::Panning { .. } => GestureOutcome::PanEnd,
        };
        self.gesture = Gesture::Idle;
        outcome
    }

    /// Abandon whatever gesture is active without emitting anything.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn live_position(&self) -> Option<MapPosition> {
        match self.gesture {
            Gesture::Dragging { live, .. } => Some(live),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn view() -> MapView {
        MapView::new(PlotRect::new(0.0, 0.0, 400.0, 400.0))
    }

    #[test]
    fn test_click_without_move_selects() {
        let mut mv = view();
        assert!(mv.pointer_down(200.0, 200.0, Some(MapPosition::new(50.0, 50.0))));
        assert_eq!(mv.pointer_up(), GestureOutcome::Select);
        assert!(mv.is_idle());
    }

    #[test]
    fn test_drag_emits_variation_target() {
        let mut mv = view();
        mv.pointer_down(200.0, 200.0, Some(MapPosition::new(50.0, 50.0)));
        let live = mv.pointer_move(300.0, 100.0).unwrap();
        assert_relative_eq!(live.x, 75.0);
        assert_relative_eq!(live.y, 75.0);
        match mv.pointer_up() {
            GestureOutcome::Variation { target } => {
                assert_relative_eq!(target.x, 75.0);
                assert_relative_eq!(target.y, 75.0);
            }
            other => panic!("expected variation, got {:?}", other),
        }
    }

    #[test]
    fn test_move_back_to_start_still_counts_as_drag() {
        let mut mv = view();
        mv.pointer_down(200.0, 200.0, Some(MapPosition::new(50.0, 50.0)));
        mv.pointer_move(200.0, 200.0);
        assert!(matches!(mv.pointer_up(), GestureOutcome::Variation { .. }));
    }

    #[test]
    fn test_drag_is_clamped_to_map() {
        let mut mv = view();
        mv.pointer_down(200.0, 200.0, Some(MapPosition::new(50.0, 50.0)));
        let live = mv.pointer_move(-80.0, 900.0).unwrap();
        assert_eq!(live, MapPosition::new(0.0, 0.0));
    }

    #[test]
    fn test_background_press_pans_instead_of_dragging() {
        let mut mv = view();
        mv.viewport.zoom(0.5);
        assert!(mv.pointer_down(100.0, 100.0, None));
        assert_eq!(mv.pointer_move(140.0, 100.0), None);
        // 40px of a 50-unit span over 400px = 5 units to the left
        assert_relative_eq!(mv.viewport.x_domain.min, 20.0);
        assert_eq!(mv.live_position(), None);
        assert_eq!(mv.pointer_up(), GestureOutcome::PanEnd);
    }

    #[test]
    fn test_drag_after_pan_uses_zoomed_window() {
        let mut mv = view();
        mv.viewport.zoom(0.5);
        mv.pointer_down(100.0, 100.0, None);
        // 80px of a 50-unit span over 400px = 10 units on each axis
        mv.pointer_move(180.0, 180.0);
        mv.pointer_up();
        assert_relative_eq!(mv.viewport.x_domain.min, 15.0);
        assert_relative_eq!(mv.viewport.y_domain.max, 85.0);

        mv.pointer_down(0.0, 0.0, Some(MapPosition::new(20.0, 20.0)));
        let live = mv.pointer_move(200.0, 200.0).unwrap();
        assert_relative_eq!(live.x, 40.0);
        assert_relative_eq!(live.y, 60.0);
        assert!(mv.viewport.contains(live));
        assert_eq!(mv.pointer_up(), GestureOutcome::Variation { target: live });
    }

    #[test]
    fn test_second_press_is_ignored_while_active() {
        let mut mv = view();
        mv.pointer_down(0.0, 0.0, None);
        assert!(!mv.pointer_down(200.0, 200.0, Some(MapPosition::new(50.0, 50.0))));
        assert!(matches!(mv.gesture(), Gesture::Panning { .. }));
    }

    #[test]
    fn test_moves_while_idle_do_nothing() {
        let mut mv = view();
        assert_eq!(mv.pointer_move(10.0, 10.0), None);
        assert_eq!(mv.pointer_up(), GestureOutcome::None);
        assert!(mv.viewport.is_full());
    }

    #[test]
    fn test_cancel_drops_drag() {
        let mut mv = view();
        mv.pointer_down(200.0, 200.0, Some(MapPosition::new(50.0, 50.0)));
        mv.pointer_move(250.0, 250.0);
        mv.cancel();
        assert_eq!(mv.pointer_up(), GestureOutcome::None);
    }

    #[test]
    fn test_hit_test() {
        let mv = view();
        let point = MapPosition::new(25.0, 75.0);
        assert!(mv.hit_test(104.0, 97.0, point, 8.0));
        assert!(!mv.hit_test(130.0, 100.0, point, 8.0));
    }
}
