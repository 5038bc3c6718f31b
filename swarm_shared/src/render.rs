//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! Entities draw through `RenderBackend`; a window, canvas or terminal
//! implementation lives in the application.

use serde::{Deserialize, Serialize};

use crate::math::{Bounds, Vec2};

/// Straight (non-premultiplied) RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const GRAY: Self = Self::new(128, 128, 128, 255);
    pub const RED: Self = Self::new(255, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from unit-range float channels.
    pub fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(q(r), q(g), q(b), q(a))
    }

    /// Scales the alpha channel by `alpha` in `[0, 1]`.
    pub fn faded(self, alpha: f32) -> Self {
        let a = (self.a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Square of side `size` centered on `center`.
    pub fn centered(center: Vec2, size: f32) -> Self {
        Self::new(center.x - size / 2.0, center.y - size / 2.0, size, size)
    }
}

/// A minimal 2D rendering API.
pub trait RenderBackend: Send + Sync {
    fn begin_frame(&mut self);
    /// Current drawable size.
    fn screen_size(&self) -> Bounds;
    /// Fills the ellipse inscribed in `rect`.
    fn fill_oval(&mut self, rect: Rect, color: Rgba);
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless tests.
#[derive(Default)]
pub struct NullRenderer {
    pub size: Bounds,
}

impl NullRenderer {
    pub fn new(size: Bounds) -> Self {
        Self { size }
    }
}

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn screen_size(&self) -> Bounds {
        self.size
    }
    fn fill_oval(&mut self, _rect: Rect, _color: Rgba) {}
    fn fill_rect(&mut self, _rect: Rect, _color: Rgba) {}
    fn end_frame(&mut self) {}
}

/// A single recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Oval(Rect, Rgba),
    Rect(Rect, Rgba),
}

/// Renderer that records the last frame's draw calls.
#[derive(Default)]
pub struct RecordingRenderer {
    pub size: Bounds,
    pub commands: Vec<DrawCmd>,
    pub frames: u64,
}

impl RecordingRenderer {
    pub fn new(size: Bounds) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn ovals(&self) -> impl Iterator<Item = (&Rect, &Rgba)> {
        self.commands.iter().filter_map(|c| match c {
            DrawCmd::Oval(r, col) => Some((r, col)),
            DrawCmd::Rect(..) => None,
        })
    }

    pub fn rects(&self) -> impl Iterator<Item = (&Rect, &Rgba)> {
        self.commands.iter().filter_map(|c| match c {
            DrawCmd::Rect(r, col) => Some((r, col)),
            DrawCmd::Oval(..) => None,
        })
    }
}

impl RenderBackend for RecordingRenderer {
    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn screen_size(&self) -> Bounds {
        self.size
    }

    fn fill_oval(&mut self, rect: Rect, color: Rgba) {
        self.commands.push(DrawCmd::Oval(rect, color));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.commands.push(DrawCmd::Rect(rect, color));
    }

    fn end_frame(&mut self) {
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faded_scales_alpha_only() {
        let c = Rgba::new(200, 40, 60, 120).faded(0.5);
        assert_eq!(c, Rgba::new(200, 40, 60, 60));
        assert_eq!(Rgba::WHITE.faded(-1.0).a, 0);
    }

    #[test]
    fn recording_renderer_resets_each_frame() {
        let mut r = RecordingRenderer::new(Bounds::new(100.0, 100.0));
        r.begin_frame();
        r.fill_oval(Rect::centered(Vec2::new(10.0, 10.0), 4.0), Rgba::WHITE);
        r.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Rgba::RED);
        r.end_frame();
        assert_eq!(r.ovals().count(), 1);
        assert_eq!(r.rects().count(), 1);

        r.begin_frame();
        r.end_frame();
        assert!(r.commands.is_empty());
        assert_eq!(r.frames, 2);
    }
}
