//! Canvas 2D surface

use std::f64::consts::TAU;

use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::protocol::Color;
use crate::render::Surface;

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    config: HostConfig,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement, config: &HostConfig) -> Result<Self> {
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| HostError::Config("canvas has no 2d context".to_string()))?;

        Ok(Self {
            canvas,
            ctx,
            config: config.clone(),
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Top-left corner in client coordinates
    pub fn origin(&self) -> (f32, f32) {
        let rect = self.canvas.get_bounding_client_rect();
        (rect.left() as f32, rect.top() as f32)
    }
}

impl Surface for CanvasSurface {
    fn size(&self) -> (f32, f32) {
        (self.canvas.width() as f32, self.canvas.height() as f32)
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.ctx.set_fill_style_str(color.hex());
        self.ctx.fill_rect(x as f64, y as f64, w as f64, h as f64);
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        self.ctx.set_fill_style_str(color.hex());
        self.ctx.begin_path();
        // a negative radius is the only failure; nothing to paint then
        if self
            .ctx
            .arc(x as f64, y as f64, radius as f64, 0.0, TAU)
            .is_ok()
        {
            self.ctx.fill();
        }
    }

    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Color) {
        self.ctx.set_stroke_style_str(color.hex());
        self.ctx.set_line_width(width as f64);
        self.ctx.begin_path();
        self.ctx.move_to(x1 as f64, y1 as f64);
        self.ctx.line_to(x2 as f64, y2 as f64);
        self.ctx.stroke();
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, size: i32, color: Color) {
        self.ctx.set_fill_style_str(color.hex());
        self.ctx.set_font(&self.config.font(size));
        if let Err(err) = self.ctx.fill_text(text, x as f64, y as f64) {
            log::warn!("fill_text failed: {:?}", err);
        }
    }
}
