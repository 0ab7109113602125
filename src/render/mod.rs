//! Rendering: drawing surfaces and command stream replay

mod dispatch;
mod surface;

pub use dispatch::{FrameDispatcher, FrameReport};
pub use surface::{DrawOp, RecordingSurface, Surface};
