//! Shared region and the typed views the host reads it through

mod region;
mod views;

pub use region::{Generation, LinearMemory, SharedRegion, PAGE_SIZE, RESERVED_LOW};
pub use views::{
    BoundViews, CircleViews, Element, Header, LineViews, RectViews, TextViews, TypedArray,
    ViewSet,
};
