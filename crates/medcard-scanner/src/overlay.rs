//! Scan-target overlay drawn over the live viewport.
//!
//! Rendering is a pure function of session state, wall-clock time and the
//! canvas size. The canvas is cleared before every frame, so nothing carries
//! over between ticks.

use image::{Rgba, RgbaImage};
use medcard_core::SymbolLocation;
use serde::{Deserialize, Serialize};

use crate::session::SessionState;

const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const SCANNING_COLOR: Rgba<u8> = Rgba([34, 197, 94, 255]);
const DECODED_COLOR: Rgba<u8> = Rgba([245, 158, 11, 255]);
const ERROR_COLOR: Rgba<u8> = Rgba([239, 68, 68, 255]);
const IDLE_COLOR: Rgba<u8> = Rgba([156, 163, 175, 255]);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayParams {
    /// Target side as a fraction of the smaller viewport dimension.
    pub target_fraction: f32,
    /// Scan-line sweep period.
    pub scan_period_ms: u32,
    /// Alpha of the dimming mask outside the target.
    pub mask_alpha: u8,
    /// Corner marker arm length as a fraction of the target side.
    pub corner_fraction: f32,
    pub corner_thickness: u32,
    pub line_thickness: u32,
}

impl Default for OverlayParams {
    fn default() -> Self {
        Self {
            target_fraction: 0.6,
            scan_period_ms: 2000,
            mask_alpha: 140,
            corner_fraction: 0.12,
            corner_thickness: 4,
            line_thickness: 2,
        }
    }
}

/// Square scan target in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetRect {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

impl TargetRect {
    /// Centered square of `fraction` times the smaller dimension.
    pub fn centered(width: u32, height: u32, fraction: f32) -> Self {
        let side = (width.min(height) as f32 * fraction.clamp(0.0, 1.0)).round() as u32;
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            side,
        }
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.side && y < self.y + self.side
    }
}

/// Vertical position of the scan line at `now_ms`.
///
/// Sweeps from the top edge to the bottom edge of the target once per
/// `period_ms`.
pub fn scan_line_y(target: &TargetRect, now_ms: i64, period_ms: u32) -> u32 {
    let period = i64::from(period_ms.max(1));
    let phase = now_ms.rem_euclid(period) as f64 / period as f64;
    let span = target.side.saturating_sub(1) as f64;
    target.y + (phase * span).round() as u32
}

/// Corner marker color for a state.
pub fn state_color(state: SessionState) -> Rgba<u8> {
    match state {
        SessionState::Scanning => SCANNING_COLOR,
        SessionState::Decoded => DECODED_COLOR,
        SessionState::Error => ERROR_COLOR,
        SessionState::Idle | SessionState::Acquiring | SessionState::Stopped => IDLE_COLOR,
    }
}

#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    params: OverlayParams,
}

impl OverlayRenderer {
    pub fn new(params: OverlayParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OverlayParams {
        &self.params
    }

    pub fn target_for(&self, canvas: &RgbaImage) -> TargetRect {
        TargetRect::centered(canvas.width(), canvas.height(), self.params.target_fraction)
    }

    /// Redraw the whole overlay for one tick.
    pub fn render(
        &self,
        canvas: &mut RgbaImage,
        state: SessionState,
        now_ms: i64,
        location: Option<&SymbolLocation>,
    ) -> TargetRect {
        let target = self.target_for(canvas);
        let mask = Rgba([0, 0, 0, self.params.mask_alpha]);
        for (x, y, px) in canvas.enumerate_pixels_mut() {
            *px = if target.contains(x, y) { CLEAR } else { mask };
        }

        let color = state_color(state);
        self.draw_corners(canvas, &target, color);

        if state == SessionState::Scanning {
            let y = scan_line_y(&target, now_ms, self.params.scan_period_ms);
            fill_rect(
                canvas,
                target.x,
                y,
                target.side,
                self.params.line_thickness,
                color,
            );
        }

        if let Some(loc) = location {
            draw_quad(canvas, loc, color);
        }
        target
    }

    fn draw_corners(&self, canvas: &mut RgbaImage, t: &TargetRect, color: Rgba<u8>) {
        let arm = ((t.side as f32 * self.params.corner_fraction).round() as u32).max(1);
        let th = self.params.corner_thickness.max(1);
        let right = t.x + t.side;
        let bottom = t.y + t.side;

        // top-left
        fill_rect(canvas, t.x, t.y, arm, th, color);
        fill_rect(canvas, t.x, t.y, th, arm, color);
        // top-right
        fill_rect(canvas, right.saturating_sub(arm), t.y, arm, th, color);
        fill_rect(canvas, right.saturating_sub(th), t.y, th, arm, color);
        // bottom-left
        fill_rect(canvas, t.x, bottom.saturating_sub(th), arm, th, color);
        fill_rect(canvas, t.x, bottom.saturating_sub(arm), th, arm, color);
        // bottom-right
        fill_rect(canvas, right.saturating_sub(arm), bottom.saturating_sub(th), arm, th, color);
        fill_rect(canvas, right.saturating_sub(th), bottom.saturating_sub(arm), th, arm, color);
    }
}

fn fill_rect(canvas: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x1 = x0.saturating_add(w).min(canvas.width());
    let y1 = y0.saturating_add(h).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn draw_quad(canvas: &mut RgbaImage, loc: &SymbolLocation, color: Rgba<u8>) {
    for i in 0..4 {
        let a = loc.corners[i];
        let b = loc.corners[(i + 1) % 4];
        draw_line(canvas, (a.x, a.y), (b.x, b.y), color);
    }
}

fn draw_line(canvas: &mut RgbaImage, a: (f32, f32), b: (f32, f32), color: Rgba<u8>) {
    let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil().max(1.0) as u32;
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = (a.0 + (b.0 - a.0) * t).round();
        let y = (a.1 + (b.1 - a.1) * t).round();
        if x >= 0.0 && y >= 0.0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}
