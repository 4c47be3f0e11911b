use serde::{Deserialize, Serialize};

use crate::map::position::{MapPosition, MAP_MAX, MAP_MIN};

/// Smallest visible span on either axis, in map units.
pub const MIN_SPAN: f64 = 1.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
}

impl Domain {
    pub const FULL: Domain = Domain {
        min: MAP_MIN,
        max: MAP_MAX,
    };

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    fn shifted(self, delta: f64) -> Domain {
        let span = self.span();
        let upper = (MAP_MAX - span).max(MAP_MIN);
        let min = (self.min + delta).min(upper).max(MAP_MIN);
        Domain {
            min,
            max: min + span,
        }
    }

    fn scaled(self, factor: f64) -> Domain {
        let center = (self.min + self.max) / 2.0;
        let span = (self.span() * factor).clamp(MIN_SPAN, MAP_MAX - MAP_MIN);
        let mut min = center - span / 2.0;
        let mut max = center + span / 2.0;
        // Translate, never resize, to get back inside the map.
        if min < MAP_MIN {
            max += MAP_MIN - min;
            min = MAP_MIN;
        }
        if max > MAP_MAX {
            min -= max - MAP_MAX;
            max = MAP_MAX;
        }
        Domain { min, max }
    }
}

/// Pixel rectangle the plot occupies on screen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PlotRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        PlotRect {
            x,
            y,
            width,
            height,
        }
    }

    fn extent(&self) -> (f64, f64) {
        (self.width.max(1.0), self.height.max(1.0))
    }
}

/// Visible window over the `[0,100]²` map.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub x_domain: Domain,
    pub y_domain: Domain,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            x_domain: Domain::FULL,
            y_domain: Domain::FULL,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift the window by a pointer delta in pixels. Spans are preserved;
    /// the shift is shortened when it would leave the map.
    pub fn pan(&mut self, dx_px: f64, dy_px: f64, plot_width: f64, plot_height: f64) {
        if plot_width <= 0.0 || plot_height <= 0.0 {
            return;
        }
        let dx = dx_px * self.x_domain.span() / plot_width;
        let dy = dy_px * self.y_domain.span() / plot_height;
        self.x_domain = self.x_domain.shifted(-dx);
        // Screen y grows downward, data y grows upward.
        self.y_domain = self.y_domain.shifted(dy);
    }

    /// Scale both spans about the window centre. `factor < 1` zooms in.
    /// Spans never drop below `MIN_SPAN` or grow past the full map, so near
    /// either limit the applied factor is smaller than the requested one.
    pub fn zoom(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            log::warn!("ignoring zoom factor {}", factor);
            return;
        }
        self.x_domain = self.x_domain.scaled(factor);
        self.y_domain = self.y_domain.scaled(factor);
    }

    pub fn reset(&mut self) {
        *self = Viewport::default();
    }

    pub fn is_full(&self) -> bool {
        self.x_domain == Domain::FULL && self.y_domain == Domain::FULL
    }

    pub fn screen_to_data(&self, px: f64, py: f64, plot: &PlotRect) -> MapPosition {
        let (w, h) = plot.extent();
        let tx = (px - plot.x) / w;
        let ty = (py - plot.y) / h;
        MapPosition {
            x: self.x_domain.min + tx * self.x_domain.span(),
            y: self.y_domain.max - ty * self.y_domain.span(),
        }
    }

    pub fn data_to_screen(&self, pos: MapPosition, plot: &PlotRect) -> (f64, f64) {
        let (w, h) = plot.extent();
        let tx = (pos.x - self.x_domain.min) / self.x_domain.span();
        let ty = (self.y_domain.max - pos.y) / self.y_domain.span();
        (plot.x + tx * w, plot.y + ty * h)
    }

    /// Whether `pos` lies inside the visible window, edges included.
    pub fn contains(&self, pos: MapPosition) -> bool {
        (self.x_domain.min..=self.x_domain.max).contains(&pos.x)
            && (self.y_domain.min..=self.y_domain.max).contains(&pos.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn window(x: (f64, f64), y: (f64, f64)) -> Viewport {
        Viewport {
            x_domain: Domain { min: x.0, max: x.1 },
            y_domain: Domain { min: y.0, max: y.1 },
        }
    }

    #[test]
    fn test_pan_clamps_at_left_edge() {
        let mut vp = window((0.0, 20.0), (0.0, 100.0));
        // Dragging right reveals lower x values
        vp.pan(50.0, 0.0, 400.0, 400.0);
        assert_eq!(vp.x_domain, Domain { min: 0.0, max: 20.0 });
    }

    #[test]
    fn test_pan_moves_by_data_delta() {
        let mut vp = window((40.0, 60.0), (40.0, 60.0));
        // 100px over 400px of a 20-unit span = 5 units
        vp.pan(-100.0, 100.0, 400.0, 400.0);
        assert_relative_eq!(vp.x_domain.min, 45.0);
        assert_relative_eq!(vp.x_domain.max, 65.0);
        assert_relative_eq!(vp.y_domain.min, 45.0);
        assert_relative_eq!(vp.y_domain.max, 65.0);
    }

    #[test]
    fn test_pan_preserves_span_at_right_edge() {
        let mut vp = window((70.0, 95.0), (0.0, 100.0));
        vp.pan(-1000.0, 0.0, 100.0, 100.0);
        assert_relative_eq!(vp.x_domain.min, 75.0);
        assert_relative_eq!(vp.x_domain.max, 100.0);
    }

    #[test]
    fn test_pan_clamps_on_y_axis_without_changing_span() {
        let mut vp = window((0.0, 100.0), (80.0, 100.0));
        // Dragging down reveals higher y, already at the top
        vp.pan(0.0, 50.0, 100.0, 100.0);
        assert_eq!(vp.y_domain, Domain { min: 80.0, max: 100.0 });

        vp.pan(0.0, -1000.0, 100.0, 100.0);
        assert_relative_eq!(vp.y_domain.min, 0.0);
        assert_relative_eq!(vp.y_domain.span(), 20.0);

        vp.pan(0.0, 33.0, 100.0, 100.0);
        assert_relative_eq!(vp.y_domain.min, 6.6, epsilon = 1e-9);
        assert_relative_eq!(vp.y_domain.span(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zoom_floor_at_min_span() {
        let mut vp = window((40.0, 42.0), (40.0, 42.0));
        vp.zoom(0.1);
        assert_relative_eq!(vp.x_domain.span(), MIN_SPAN);
        assert_relative_eq!(vp.y_domain.span(), MIN_SPAN);
    }

    #[test]
    fn test_contains_includes_edges() {
        let vp = window((20.0, 40.0), (50.0, 70.0));
        assert!(vp.contains(MapPosition::new(20.0, 70.0)));
        assert!(vp.contains(MapPosition::new(30.0, 60.0)));
        assert!(!vp.contains(MapPosition::new(19.9, 60.0)));
        assert!(!vp.contains(MapPosition::new(30.0, 70.1)));
    }

    #[test]
    fn test_zoom_out_at_full_range_is_noop() {
        for factor in [1.0, 1.5, 4.0] {
            let mut vp = Viewport::new();
            vp.zoom(factor);
            assert!(vp.is_full(), "factor {} changed the full window", factor);
        }
    }

    #[test]
    fn test_zoom_in_about_center() {
        let mut vp = Viewport::new();
        vp.zoom(0.5);
        assert_relative_eq!(vp.x_domain.min, 25.0);
        assert_relative_eq!(vp.x_domain.max, 75.0);
    }

    #[test]
    fn test_zoom_out_translates_back_inside() {
        let mut vp = window((0.0, 20.0), (80.0, 100.0));
        vp.zoom(2.0);
        assert_relative_eq!(vp.x_domain.min, 0.0);
        assert_relative_eq!(vp.x_domain.max, 40.0);
        assert_relative_eq!(vp.y_domain.min, 60.0);
        assert_relative_eq!(vp.y_domain.max, 100.0);
    }

    #[test]
    fn test_zoom_ignores_bad_factor() {
        let mut vp = window((10.0, 30.0), (10.0, 30.0));
        let before = vp;
        vp.zoom(0.0);
        vp.zoom(-2.0);
        vp.zoom(f64::INFINITY);
        assert_eq!(vp, before);
    }

    #[test]
    fn test_reset() {
        let mut vp = window((10.0, 30.0), (50.0, 55.0));
        vp.reset();
        assert!(vp.is_full());
    }

    #[test]
    fn test_screen_to_data_inverts_y() {
        let vp = window((20.0, 40.0), (0.0, 50.0));
        let plot = PlotRect::new(10.0, 10.0, 200.0, 100.0);
        let top_left = vp.screen_to_data(10.0, 10.0, &plot);
        assert_relative_eq!(top_left.x, 20.0);
        assert_relative_eq!(top_left.y, 50.0);
        let bottom_right = vp.screen_to_data(210.0, 110.0, &plot);
        assert_relative_eq!(bottom_right.x, 40.0);
        assert_relative_eq!(bottom_right.y, 0.0);
    }

    #[test]
    fn test_data_to_screen_round_trips() {
        let vp = window((5.0, 65.0), (30.0, 90.0));
        let plot = PlotRect::new(40.0, 20.0, 600.0, 300.0);
        let pos = MapPosition::new(33.0, 47.0);
        let (sx, sy) = vp.data_to_screen(pos, &plot);
        let back = vp.screen_to_data(sx, sy, &plot);
        assert_relative_eq!(back.x, pos.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, pos.y, epsilon = 1e-9);
    }
}
