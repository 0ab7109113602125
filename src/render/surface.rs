//! Drawing surface the dispatcher paints onto

use serde::Serialize;

use crate::protocol::Color;

/// Immediate-mode 2D drawing target
pub trait Surface {
    /// Width and height in pixels
    fn size(&self) -> (f32, f32);

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color);

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color);

    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Color);

    /// `size` is the font size in pixels
    fn fill_text(&mut self, text: &str, x: f32, y: f32, size: i32, color: Color);

    /// Paint the entire surface
    fn clear(&mut self, color: Color) {
        let (w, h) = self.size();
        self.fill_rect(0.0, 0.0, w, h, color);
    }
}

/// A recorded paint operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawOp {
    Clear {
        color: Color,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Color,
    },
    Circle {
        x: f32,
        y: f32,
        radius: f32,
        color: Color,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Color,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: i32,
        color: Color,
    },
}

/// Surface that records every operation, for headless runs
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: f32,
    height: f32,
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Take the recorded operations, leaving the surface empty
    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.ops.push(DrawOp::Rect { x, y, w, h, color });
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        self.ops.push(DrawOp::Circle { x, y, radius, color });
    }

    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Color) {
        self.ops.push(DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, size: i32, color: Color) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            size,
            color,
        });
    }

    fn clear(&mut self, color: Color) {
        self.ops.push(DrawOp::Clear { color });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCanvas(Vec<(f32, f32, f32, f32)>);

    impl Surface for FixedCanvas {
        fn size(&self) -> (f32, f32) {
            (640.0, 480.0)
        }
        fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, _color: Color) {
            self.0.push((x, y, w, h));
        }
        fn fill_circle(&mut self, _: f32, _: f32, _: f32, _: Color) {}
        fn stroke_line(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Color) {}
        fn fill_text(&mut self, _: &str, _: f32, _: f32, _: i32, _: Color) {}
    }

    #[test]
    fn test_default_clear_fills_surface() {
        let mut surface = FixedCanvas(Vec::new());
        surface.clear(Color::Blue);
        assert_eq!(surface.0, vec![(0.0, 0.0, 640.0, 480.0)]);
    }

    #[test]
    fn test_recording_and_take() {
        let mut surface = RecordingSurface::new(100.0, 100.0);
        surface.clear(Color::Black);
        surface.fill_text("hi", 1.0, 2.0, 12, Color::White);
        assert_eq!(surface.ops().len(), 2);
        let ops = surface.take_ops();
        assert_eq!(ops[0], DrawOp::Clear { color: Color::Black });
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn test_draw_op_json() {
        let op = DrawOp::Circle {
            x: 1.0,
            y: 2.0,
            radius: 3.0,
            color: Color::Green,
        };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"op":"circle","x":1.0,"y":2.0,"radius":3.0,"color":"Green"}"#);
    }
}
