//! Command stream codec
//!
//! A command code is one u16: the kind tag in bits 12-15, the per-kind slot
//! index in bits 0-11. Stream order is paint order.

use super::layout::{Field, MAX_CIRCLES, MAX_LINES, MAX_RECTS, MAX_TEXTS};

pub const KIND_SHIFT: u16 = 12;
pub const INDEX_MASK: u16 = 0x0FFF;

/// Kind tags (must match the producer)
pub const CMD_RECT: u8 = 1;
pub const CMD_CIRCLE: u8 = 2;
pub const CMD_LINE: u8 = 3;
pub const CMD_TEXT: u8 = 4;

/// Pack a kind tag and slot index. Bits above the tag/index width are dropped.
#[inline]
pub const fn encode(kind: u8, index: u16) -> u16 {
    (((kind as u16) & 0xF) << KIND_SHIFT) | (index & INDEX_MASK)
}

/// Unpack a code into `(kind, index)`. Total over all u16 values.
#[inline]
pub const fn decode(code: u16) -> (u8, u16) {
    ((code >> KIND_SHIFT) as u8, code & INDEX_MASK)
}

/// The defined command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Rect,
    Circle,
    Line,
    Text,
}

impl CommandKind {
    /// Reserved tags (0, 5-15) map to `None`
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            CMD_RECT => Some(CommandKind::Rect),
            CMD_CIRCLE => Some(CommandKind::Circle),
            CMD_LINE => Some(CommandKind::Line),
            CMD_TEXT => Some(CommandKind::Text),
            _ => None,
        }
    }

    pub const fn tag(self) -> u8 {
        match self {
            CommandKind::Rect => CMD_RECT,
            CommandKind::Circle => CMD_CIRCLE,
            CommandKind::Line => CMD_LINE,
            CommandKind::Text => CMD_TEXT,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CommandKind::Rect => "rect",
            CommandKind::Circle => "circle",
            CommandKind::Line => "line",
            CommandKind::Text => "text",
        }
    }

    /// Slot capacity of this kind's arrays
    pub const fn capacity(self) -> usize {
        match self {
            CommandKind::Rect => MAX_RECTS,
            CommandKind::Circle => MAX_CIRCLES,
            CommandKind::Line => MAX_LINES,
            CommandKind::Text => MAX_TEXTS,
        }
    }

    /// Header field holding this kind's live slot count
    pub const fn count_field(self) -> Field {
        match self {
            CommandKind::Rect => Field::RectCount,
            CommandKind::Circle => Field::CircleCount,
            CommandKind::Line => Field::LineCount,
            CommandKind::Text => Field::TextCount,
        }
    }

    pub const fn code(self, index: u16) -> u16 {
        encode(self.tag(), index)
    }
}

/// A decoded stream entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub tag: u8,
    pub index: u16,
}

impl Command {
    #[inline]
    pub const fn from_code(code: u16) -> Self {
        let (tag, index) = decode(code);
        Self { tag, index }
    }

    #[inline]
    pub const fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_tag(self.tag)
    }
}
