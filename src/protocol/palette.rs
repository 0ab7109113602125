//! Fixed color palette, indexed by the producer's color enum (alphabetical order)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    DarkGray = 2,
    Gray = 3,
    Green = 4,
    LightGray = 5,
    Orange = 6,
    Pink = 7,
    Purple = 8,
    RayWhite = 9,
    Red = 10,
    White = 11,
    Yellow = 12,
}

pub const PALETTE_LEN: usize = 13;

const PALETTE: [Color; PALETTE_LEN] = [
    Color::Black,
    Color::Blue,
    Color::DarkGray,
    Color::Gray,
    Color::Green,
    Color::LightGray,
    Color::Orange,
    Color::Pink,
    Color::Purple,
    Color::RayWhite,
    Color::Red,
    Color::White,
    Color::Yellow,
];

impl Color {
    pub fn from_index(index: u8) -> Option<Color> {
        PALETTE.get(index as usize).copied()
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// CSS hex string
    pub const fn hex(self) -> &'static str {
        match self {
            Color::Black => "#000000",
            Color::Blue => "#0000ff",
            Color::DarkGray => "#505050",
            Color::Gray => "#808080",
            Color::Green => "#00ff00",
            Color::LightGray => "#c0c0c0",
            Color::Orange => "#ffa500",
            Color::Pink => "#ffc0cb",
            Color::Purple => "#800080",
            Color::RayWhite => "#f5f5f5",
            Color::Red => "#ff0000",
            Color::White => "#ffffff",
            Color::Yellow => "#ffff00",
        }
    }

    pub const fn rgb(self) -> [u8; 3] {
        match self {
            Color::Black => [0x00, 0x00, 0x00],
            Color::Blue => [0x00, 0x00, 0xff],
            Color::DarkGray => [0x50, 0x50, 0x50],
            Color::Gray => [0x80, 0x80, 0x80],
            Color::Green => [0x00, 0xff, 0x00],
            Color::LightGray => [0xc0, 0xc0, 0xc0],
            Color::Orange => [0xff, 0xa5, 0x00],
            Color::Pink => [0xff, 0xc0, 0xcb],
            Color::Purple => [0x80, 0x00, 0x80],
            Color::RayWhite => [0xf5, 0xf5, 0xf5],
            Color::Red => [0xff, 0x00, 0x00],
            Color::White => [0xff, 0xff, 0xff],
            Color::Yellow => [0xff, 0xff, 0x00],
        }
    }
}
