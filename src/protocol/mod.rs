//! Wire protocol: layout constants, command codec, palette

mod codec;
mod layout;
mod palette;

pub use codec::*;
pub use layout::*;
pub use palette::{Color, PALETTE_LEN};
