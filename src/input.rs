//! Pointer, button and wheel state forwarded to the producer each frame

use crate::producer::FrameInput;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputState {
    pointer_x: f32,
    pointer_y: f32,
    buttons: u32,
    wheel: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer moved to client coordinates `(x, y)`; `origin` is the
    /// surface's top-left corner in the same space
    pub fn pointer_moved(&mut self, x: f32, y: f32, origin: (f32, f32)) {
        self.pointer_x = x - origin.0;
        self.pointer_y = y - origin.1;
    }

    pub fn button_down(&mut self, button: u32) {
        if button < 32 {
            self.buttons |= 1 << button;
        }
    }

    pub fn button_up(&mut self, button: u32) {
        if button < 32 {
            self.buttons &= !(1 << button);
        }
    }

    /// Pointer left the surface: no button stays held
    pub fn pointer_left(&mut self) {
        self.buttons = 0;
    }

    /// Latest wheel delta; a one-frame event, not a level
    pub fn wheel(&mut self, delta_y: f32) {
        self.wheel = delta_y;
    }

    pub fn buttons(&self) -> u32 {
        self.buttons
    }

    /// Snapshot for the producer's frame call. Resets the wheel.
    pub fn take_frame_input(&mut self) -> FrameInput {
        let input = FrameInput {
            pointer_x: self.pointer_x,
            pointer_y: self.pointer_y,
            buttons: self.buttons,
            wheel: self.wheel,
        };
        self.wheel = 0.0;
        input
    }
}
