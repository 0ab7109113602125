//! Fixed wire layout shared by producer and consumer
//!
//! The command buffer is a fields-of-arrays block inside the producer's linear
//! memory. Every field lives at `base + offset`, where `offset` is queried from
//! the producer once per instantiation. All numeric fields are little-endian.
//!
//! ```text
//! Header:
//!   has_clear          u8
//!   clear_color        u8
//!   cmd_count          u32
//!   rect_count         u32   circle_count u32   line_count u32   text_count u32
//!   string_buffer_len  u32
//!
//! Command stream:
//!   cmd_stream         u16 x 2048   (kind << 12 | index)
//!
//! Per-kind arrays (slot i valid iff i < <kind>_count):
//!   rect_x, rect_y, rect_w, rect_h             f32 x 1024, rect_color u8 x 1024
//!   circle_x, circle_y, circle_radius          f32 x 512,  circle_color u8 x 512
//!   line_x1, line_y1, line_x2, line_y2         f32 x 512,  line_color u8 x 512
//!   text_x, text_y f32 x 256, text_size i32 x 256, text_color u8 x 256
//!   text_str_offset, text_str_len              u16 x 256
//!
//! String table:
//!   string_buffer      u8 x 8192
//! ```

/// Command stream capacity
pub const MAX_COMMANDS: usize = 2048;
pub const MAX_RECTS: usize = 1024;
pub const MAX_CIRCLES: usize = 512;
pub const MAX_LINES: usize = 512;
pub const MAX_TEXTS: usize = 256;
/// String table capacity in bytes
pub const MAX_STRING_BYTES: usize = 8192;

/// Export returning the base pointer of the command buffer
pub const CMD_BUFFER_PTR_EXPORT: &str = "_get_cmd_buffer_ptr";
/// Prefix of every per-field offset accessor export
pub const OFFSET_EXPORT_PREFIX: &str = "_get_offset_";

/// Element type of a field's array view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    U8,
    U16,
    U32,
    I32,
    F32,
}

impl ElemType {
    /// Element width in bytes
    pub const fn size(self) -> usize {
        match self {
            ElemType::U8 => 1,
            ElemType::U16 => 2,
            ElemType::U32 | ElemType::I32 | ElemType::F32 => 4,
        }
    }
}

/// Every named field of the command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    HasClear,
    ClearColor,
    CmdStream,
    CmdCount,
    RectCount,
    RectX,
    RectY,
    RectW,
    RectH,
    RectColor,
    CircleCount,
    CircleX,
    CircleY,
    CircleRadius,
    CircleColor,
    LineCount,
    LineX1,
    LineY1,
    LineX2,
    LineY2,
    LineColor,
    TextCount,
    TextX,
    TextY,
    TextSize,
    TextColor,
    TextStrOffset,
    TextStrLen,
    StringBuffer,
    StringBufferLen,
}

impl Field {
    pub const COUNT: usize = 30;

    /// All fields in declaration order
    pub const ALL: [Field; Field::COUNT] = [
        Field::HasClear,
        Field::ClearColor,
        Field::CmdStream,
        Field::CmdCount,
        Field::RectCount,
        Field::RectX,
        Field::RectY,
        Field::RectW,
        Field::RectH,
        Field::RectColor,
        Field::CircleCount,
        Field::CircleX,
        Field::CircleY,
        Field::CircleRadius,
        Field::CircleColor,
        Field::LineCount,
        Field::LineX1,
        Field::LineY1,
        Field::LineX2,
        Field::LineY2,
        Field::LineColor,
        Field::TextCount,
        Field::TextX,
        Field::TextY,
        Field::TextSize,
        Field::TextColor,
        Field::TextStrOffset,
        Field::TextStrLen,
        Field::StringBuffer,
        Field::StringBufferLen,
    ];

    /// Wire name, as used in the producer's accessor exports
    pub const fn name(self) -> &'static str {
        match self {
            Field::HasClear => "has_clear",
            Field::ClearColor => "clear_color",
            Field::CmdStream => "cmd_stream",
            Field::CmdCount => "cmd_count",
            Field::RectCount => "rect_count",
            Field::RectX => "rect_x",
            Field::RectY => "rect_y",
            Field::RectW => "rect_w",
            Field::RectH => "rect_h",
            Field::RectColor => "rect_color",
            Field::CircleCount => "circle_count",
            Field::CircleX => "circle_x",
            Field::CircleY => "circle_y",
            Field::CircleRadius => "circle_radius",
            Field::CircleColor => "circle_color",
            Field::LineCount => "line_count",
            Field::LineX1 => "line_x1",
            Field::LineY1 => "line_y1",
            Field::LineX2 => "line_x2",
            Field::LineY2 => "line_y2",
            Field::LineColor => "line_color",
            Field::TextCount => "text_count",
            Field::TextX => "text_x",
            Field::TextY => "text_y",
            Field::TextSize => "text_size",
            Field::TextColor => "text_color",
            Field::TextStrOffset => "text_str_offset",
            Field::TextStrLen => "text_str_len",
            Field::StringBuffer => "string_buffer",
            Field::StringBufferLen => "string_buffer_len",
        }
    }

    /// Name of the producer export returning this field's byte offset
    pub fn accessor(self) -> String {
        format!("{}{}", OFFSET_EXPORT_PREFIX, self.name())
    }

    pub const fn elem(self) -> ElemType {
        match self {
            Field::HasClear
            | Field::ClearColor
            | Field::RectColor
            | Field::CircleColor
            | Field::LineColor
            | Field::TextColor
            | Field::StringBuffer => ElemType::U8,
            Field::CmdStream | Field::TextStrOffset | Field::TextStrLen => ElemType::U16,
            Field::CmdCount
            | Field::RectCount
            | Field::CircleCount
            | Field::LineCount
            | Field::TextCount
            | Field::StringBufferLen => ElemType::U32,
            Field::TextSize => ElemType::I32,
            _ => ElemType::F32,
        }
    }

    /// Declared element count. Views always span the full capacity.
    pub const fn capacity(self) -> usize {
        match self {
            Field::HasClear
            | Field::ClearColor
            | Field::CmdCount
            | Field::RectCount
            | Field::CircleCount
            | Field::LineCount
            | Field::TextCount
            | Field::StringBufferLen => 1,
            Field::CmdStream => MAX_COMMANDS,
            Field::RectX | Field::RectY | Field::RectW | Field::RectH | Field::RectColor => {
                MAX_RECTS
            }
            Field::CircleX | Field::CircleY | Field::CircleRadius | Field::CircleColor => {
                MAX_CIRCLES
            }
            Field::LineX1
            | Field::LineY1
            | Field::LineX2
            | Field::LineY2
            | Field::LineColor => MAX_LINES,
            Field::TextX
            | Field::TextY
            | Field::TextSize
            | Field::TextColor
            | Field::TextStrOffset
            | Field::TextStrLen => MAX_TEXTS,
            Field::StringBuffer => MAX_STRING_BYTES,
        }
    }

    /// Size of the field's view in bytes
    pub const fn byte_len(self) -> usize {
        self.elem().size() * self.capacity()
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}
