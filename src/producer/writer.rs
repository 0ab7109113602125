//! Producer-side encoder for the command buffer layout
//!
//! Writes draw commands into the fields-of-arrays block exactly as a
//! conformant producer module must: per-kind slot arrays, a command stream in
//! call order, and text bytes appended to the string table.

use std::mem::{align_of, offset_of, size_of};

use unicode_segmentation::UnicodeSegmentation;

use crate::memory::{LinearMemory, SharedRegion};
use crate::protocol::{
    Color, CommandKind, Field, MAX_CIRCLES, MAX_COMMANDS, MAX_LINES, MAX_RECTS,
    MAX_STRING_BYTES, MAX_TEXTS,
};

/// Memory layout of the command buffer. Never constructed; it only pins
/// field offsets the way a C-layout struct in the producer would.
#[repr(C)]
pub struct CommandBufferLayout {
    pub has_clear: u8,
    pub clear_color: u8,
    pub cmd_count: u32,
    pub cmd_stream: [u16; MAX_COMMANDS],

    pub rect_count: u32,
    pub rect_x: [f32; MAX_RECTS],
    pub rect_y: [f32; MAX_RECTS],
    pub rect_w: [f32; MAX_RECTS],
    pub rect_h: [f32; MAX_RECTS],
    pub rect_color: [u8; MAX_RECTS],

    pub circle_count: u32,
    pub circle_x: [f32; MAX_CIRCLES],
    pub circle_y: [f32; MAX_CIRCLES],
    pub circle_radius: [f32; MAX_CIRCLES],
    pub circle_color: [u8; MAX_CIRCLES],

    pub line_count: u32,
    pub line_x1: [f32; MAX_LINES],
    pub line_y1: [f32; MAX_LINES],
    pub line_x2: [f32; MAX_LINES],
    pub line_y2: [f32; MAX_LINES],
    pub line_color: [u8; MAX_LINES],

    pub text_count: u32,
    pub text_x: [f32; MAX_TEXTS],
    pub text_y: [f32; MAX_TEXTS],
    pub text_size: [i32; MAX_TEXTS],
    pub text_color: [u8; MAX_TEXTS],
    pub text_str_offset: [u16; MAX_TEXTS],
    pub text_str_len: [u16; MAX_TEXTS],

    pub string_buffer_len: u32,
    pub string_buffer: [u8; MAX_STRING_BYTES],
}

pub const BUFFER_SIZE: usize = size_of::<CommandBufferLayout>();
pub const BUFFER_ALIGN: usize = align_of::<CommandBufferLayout>();

/// Byte offset of a field within [`CommandBufferLayout`]
pub const fn field_offset(field: Field) -> usize {
    match field {
        Field::HasClear => offset_of!(CommandBufferLayout, has_clear),
        Field::ClearColor => offset_of!(CommandBufferLayout, clear_color),
        Field::CmdStream => offset_of!(CommandBufferLayout, cmd_stream),
        Field::CmdCount => offset_of!(CommandBufferLayout, cmd_count),
        Field::RectCount => offset_of!(CommandBufferLayout, rect_count),
        Field::RectX => offset_of!(CommandBufferLayout, rect_x),
        Field::RectY => offset_of!(CommandBufferLayout, rect_y),
        Field::RectW => offset_of!(CommandBufferLayout, rect_w),
        Field::RectH => offset_of!(CommandBufferLayout, rect_h),
        Field::RectColor => offset_of!(CommandBufferLayout, rect_color),
        Field::CircleCount => offset_of!(CommandBufferLayout, circle_count),
        Field::CircleX => offset_of!(CommandBufferLayout, circle_x),
        Field::CircleY => offset_of!(CommandBufferLayout, circle_y),
        Field::CircleRadius => offset_of!(CommandBufferLayout, circle_radius),
        Field::CircleColor => offset_of!(CommandBufferLayout, circle_color),
        Field::LineCount => offset_of!(CommandBufferLayout, line_count),
        Field::LineX1 => offset_of!(CommandBufferLayout, line_x1),
        Field::LineY1 => offset_of!(CommandBufferLayout, line_y1),
        Field::LineX2 => offset_of!(CommandBufferLayout, line_x2),
        Field::LineY2 => offset_of!(CommandBufferLayout, line_y2),
        Field::LineColor => offset_of!(CommandBufferLayout, line_color),
        Field::TextCount => offset_of!(CommandBufferLayout, text_count),
        Field::TextX => offset_of!(CommandBufferLayout, text_x),
        Field::TextY => offset_of!(CommandBufferLayout, text_y),
        Field::TextSize => offset_of!(CommandBufferLayout, text_size),
        Field::TextColor => offset_of!(CommandBufferLayout, text_color),
        Field::TextStrOffset => offset_of!(CommandBufferLayout, text_str_offset),
        Field::TextStrLen => offset_of!(CommandBufferLayout, text_str_len),
        Field::StringBuffer => offset_of!(CommandBufferLayout, string_buffer),
        Field::StringBufferLen => offset_of!(CommandBufferLayout, string_buffer_len),
    }
}

/// Writes commands into a command buffer at `base`
pub struct CommandWriter<'a> {
    memory: &'a mut LinearMemory,
    base: usize,
    dropped: u32,
}

impl<'a> CommandWriter<'a> {
    /// `base` must point at `BUFFER_SIZE` bytes allocated in `memory`
    pub fn new(memory: &'a mut LinearMemory, base: u32) -> Self {
        Self {
            memory,
            base: base as usize,
            dropped: 0,
        }
    }

    /// Start a new frame: no clear, every count zero. Slot contents are left
    /// as they are; readers never look past the counts.
    pub fn reset(&mut self) {
        self.put(Field::HasClear, 0, [0u8]);
        self.put(Field::ClearColor, 0, [0u8]);
        for field in [
            Field::CmdCount,
            Field::RectCount,
            Field::CircleCount,
            Field::LineCount,
            Field::TextCount,
            Field::StringBufferLen,
        ] {
            self.set_scalar(field, 0);
        }
        self.dropped = 0;
    }

    /// Clear the whole surface before any command this frame
    pub fn clear(&mut self, color: Color) {
        self.put(Field::HasClear, 0, [1u8]);
        self.put(Field::ClearColor, 0, [color.index()]);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) -> Option<u16> {
        let slot = self.push(CommandKind::Rect)?;
        let i = slot as usize;
        self.put(Field::RectX, i, x.to_le_bytes());
        self.put(Field::RectY, i, y.to_le_bytes());
        self.put(Field::RectW, i, w.to_le_bytes());
        self.put(Field::RectH, i, h.to_le_bytes());
        self.put(Field::RectColor, i, [color.index()]);
        Some(slot)
    }

    pub fn circle(&mut self, x: f32, y: f32, radius: f32, color: Color) -> Option<u16> {
        let slot = self.push(CommandKind::Circle)?;
        let i = slot as usize;
        self.put(Field::CircleX, i, x.to_le_bytes());
        self.put(Field::CircleY, i, y.to_le_bytes());
        self.put(Field::CircleRadius, i, radius.to_le_bytes());
        self.put(Field::CircleColor, i, [color.index()]);
        Some(slot)
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color) -> Option<u16> {
        let slot = self.push(CommandKind::Line)?;
        let i = slot as usize;
        self.put(Field::LineX1, i, x1.to_le_bytes());
        self.put(Field::LineY1, i, y1.to_le_bytes());
        self.put(Field::LineX2, i, x2.to_le_bytes());
        self.put(Field::LineY2, i, y2.to_le_bytes());
        self.put(Field::LineColor, i, [color.index()]);
        Some(slot)
    }

    /// Append text to the string table and emit a text command.
    ///
    /// When the table is nearly full the text is cut at the last grapheme
    /// boundary that fits; if nothing fits the command is dropped.
    pub fn text(&mut self, x: f32, y: f32, size: i32, color: Color, text: &str) -> Option<u16> {
        let used = self.scalar(Field::StringBufferLen) as usize;
        let room = MAX_STRING_BYTES.saturating_sub(used);
        let fitted = fit_graphemes(text, room);
        if fitted.is_empty() && !text.is_empty() {
            log::trace!("string table full, dropping text of {} bytes", text.len());
            self.dropped += 1;
            return None;
        }

        let slot = self.push(CommandKind::Text)?;
        let i = slot as usize;
        let at = self.base + field_offset(Field::StringBuffer) + used;
        self.memory.bytes_mut()[at..at + fitted.len()].copy_from_slice(fitted.as_bytes());
        self.set_scalar(Field::StringBufferLen, (used + fitted.len()) as u32);

        self.put(Field::TextX, i, x.to_le_bytes());
        self.put(Field::TextY, i, y.to_le_bytes());
        self.put(Field::TextSize, i, size.to_le_bytes());
        self.put(Field::TextColor, i, [color.index()]);
        self.put(Field::TextStrOffset, i, (used as u16).to_le_bytes());
        self.put(Field::TextStrLen, i, (fitted.len() as u16).to_le_bytes());
        Some(slot)
    }

    /// Append a raw stream code, bypassing slot allocation. Lets a producer
    /// emit reserved kinds; returns `false` when the stream is full.
    pub fn emit_code(&mut self, code: u16) -> bool {
        let cmd_count = self.scalar(Field::CmdCount) as usize;
        if cmd_count >= MAX_COMMANDS {
            self.dropped += 1;
            return false;
        }
        self.put(Field::CmdStream, cmd_count, code.to_le_bytes());
        self.set_scalar(Field::CmdCount, cmd_count as u32 + 1);
        true
    }

    /// Commands written this frame
    pub fn cmd_count(&self) -> u32 {
        self.scalar(Field::CmdCount)
    }

    /// Commands dropped this frame because a capacity was exhausted
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub(crate) fn memory_mut(&mut self) -> &mut LinearMemory {
        self.memory
    }

    pub(crate) fn memory(&self) -> &LinearMemory {
        self.memory
    }

    /// Reserve the next slot of `kind` and append its code to the stream
    fn push(&mut self, kind: CommandKind) -> Option<u16> {
        let cmd_count = self.scalar(Field::CmdCount) as usize;
        let slot = self.scalar(kind.count_field()) as usize;
        if cmd_count >= MAX_COMMANDS || slot >= kind.capacity() {
            log::trace!("{} capacity exhausted, dropping command", kind.name());
            self.dropped += 1;
            return None;
        }

        self.put(Field::CmdStream, cmd_count, kind.code(slot as u16).to_le_bytes());
        self.set_scalar(Field::CmdCount, cmd_count as u32 + 1);
        self.set_scalar(kind.count_field(), slot as u32 + 1);
        Some(slot as u16)
    }

    fn scalar(&self, field: Field) -> u32 {
        let at = self.base + field_offset(field);
        let bytes = &self.memory.bytes()[at..at + 4];
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn set_scalar(&mut self, field: Field, value: u32) {
        self.put(field, 0, value.to_le_bytes());
    }

    fn put<const N: usize>(&mut self, field: Field, index: usize, bytes: [u8; N]) {
        debug_assert_eq!(N, field.elem().size(), "element width mismatch for {}", field.name());
        debug_assert!(index < field.capacity(), "{}[{}] out of capacity", field.name(), index);
        let at = self.base + field_offset(field) + index * N;
        self.memory.bytes_mut()[at..at + N].copy_from_slice(&bytes);
    }
}

/// Longest grapheme-aligned prefix of `text` that fits in `room` bytes
fn fit_graphemes(text: &str, room: usize) -> &str {
    if text.len() <= room {
        return text;
    }
    let mut end = 0;
    for (start, grapheme) in text.grapheme_indices(true) {
        if start + grapheme.len() > room {
            break;
        }
        end = start + grapheme.len();
    }
    &text[..end]
}
