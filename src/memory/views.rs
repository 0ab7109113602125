//! Buffer view set: typed, capacity-sized views into the command buffer
//!
//! A [`ViewSet`] records where every field lives (`base + offset`, full
//! capacity) and which [`Generation`] of the region it was built against.
//! Reading always goes through [`ViewSet::bind`], which refuses to hand out
//! slices when the region's storage has been replaced since the build.

use std::marker::PhantomData;
use std::ops::Range;

use crate::error::{HostError, Result};
use crate::memory::region::{Generation, SharedRegion};
use crate::offsets::OffsetTable;
use crate::protocol::{CommandKind, Field};
use crate::strings::StringTable;

/// Fixed-width little-endian wire element
pub trait Element: Copy {
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn from_le(bytes: &[u8]) -> Self;
}

impl Element for u8 {
    const SIZE: usize = 1;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Element for u16 {
    const SIZE: usize = 2;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl Element for u32 {
    const SIZE: usize = 4;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Element for i32 {
    const SIZE: usize = 4;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Element for f32 {
    const SIZE: usize = 4;

    #[inline]
    fn from_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Typed array over a borrowed byte slice
#[derive(Debug, Clone, Copy)]
pub struct TypedArray<'a, T> {
    bytes: &'a [u8],
    _elem: PhantomData<T>,
}

impl<'a, T: Element + 'a> TypedArray<'a, T> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            _elem: PhantomData,
        }
    }

    /// Element capacity
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / T::SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        let start = index.checked_mul(T::SIZE)?;
        self.bytes.get(start..start + T::SIZE).map(T::from_le)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        self.bytes.chunks_exact(T::SIZE).map(T::from_le)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// `base + offset .. + len` within a 32-bit address space
    fn at(base: u32, offset: u32, len: usize) -> Option<Self> {
        let start = base.checked_add(offset)?;
        let end = start.checked_add(u32::try_from(len).ok()?)?;
        Some(Self {
            start: start as usize,
            end: end as usize,
        })
    }
}

/// Positions of every field for one generation of the shared region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSet {
    generation: Generation,
    base: u32,
    spans: [Span; Field::COUNT],
}

impl ViewSet {
    /// Position one view per field at `base + offset`, spanning full capacity
    pub fn build<R: SharedRegion + ?Sized>(
        region: &R,
        base: u32,
        offsets: &OffsetTable,
    ) -> Result<Self> {
        let region_len = region.len();
        let mut spans = [Span::default(); Field::COUNT];

        for field in Field::ALL {
            let span = Span::at(base, offsets.get(field), field.byte_len());
            match span {
                Some(span) if span.end <= region_len => spans[field.index()] = span,
                _ => {
                    let start = base as usize;
                    return Err(HostError::ViewOutOfBounds {
                        field: field.name(),
                        start: span.map_or(start, |s| s.start),
                        end: span.map_or(usize::MAX, |s| s.end),
                        region_len,
                    });
                }
            }
        }

        log::debug!(
            "buffer views created at base {} (generation {})",
            base,
            region.generation().0
        );
        Ok(Self {
            generation: region.generation(),
            base,
            spans,
        })
    }

    /// Rebuild against the region's current storage
    pub fn rebuild<R: SharedRegion + ?Sized>(
        &mut self,
        region: &R,
        base: u32,
        offsets: &OffsetTable,
    ) -> Result<()> {
        *self = Self::build(region, base, offsets)?;
        Ok(())
    }

    /// Whether these views still refer to the region's current storage
    #[inline]
    pub fn is_attached<R: SharedRegion + ?Sized>(&self, region: &R) -> bool {
        self.generation == region.generation()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Byte range covering every field
    pub fn window(&self) -> Range<usize> {
        let start = self.spans.iter().map(|s| s.start).min().unwrap_or(0);
        let end = self.spans.iter().map(|s| s.end).max().unwrap_or(0);
        start..end
    }

    /// Borrow typed arrays from the region. Fails on a stale view set.
    pub fn bind<'a, R: SharedRegion + ?Sized>(&self, region: &'a R) -> Result<BoundViews<'a>> {
        if !self.is_attached(region) {
            return Err(HostError::StaleViews {
                built: self.generation.0,
                current: region.generation().0,
            });
        }

        let bytes = region.bytes();
        let slice = |field: Field| -> Result<&'a [u8]> {
            let span = self.spans[field.index()];
            bytes
                .get(span.start..span.end)
                .ok_or(HostError::ViewOutOfBounds {
                    field: field.name(),
                    start: span.start,
                    end: span.end,
                    region_len: bytes.len(),
                })
        };

        Ok(BoundViews {
            has_clear: TypedArray::new(slice(Field::HasClear)?),
            clear_color: TypedArray::new(slice(Field::ClearColor)?),
            cmd_count: TypedArray::new(slice(Field::CmdCount)?),
            cmd_stream: TypedArray::new(slice(Field::CmdStream)?),
            rects: RectViews {
                count: TypedArray::new(slice(Field::RectCount)?),
                x: TypedArray::new(slice(Field::RectX)?),
                y: TypedArray::new(slice(Field::RectY)?),
                w: TypedArray::new(slice(Field::RectW)?),
                h: TypedArray::new(slice(Field::RectH)?),
                color: TypedArray::new(slice(Field::RectColor)?),
            },
            circles: CircleViews {
                count: TypedArray::new(slice(Field::CircleCount)?),
                x: TypedArray::new(slice(Field::CircleX)?),
                y: TypedArray::new(slice(Field::CircleY)?),
                radius: TypedArray::new(slice(Field::CircleRadius)?),
                color: TypedArray::new(slice(Field::CircleColor)?),
            },
            lines: LineViews {
                count: TypedArray::new(slice(Field::LineCount)?),
                x1: TypedArray::new(slice(Field::LineX1)?),
                y1: TypedArray::new(slice(Field::LineY1)?),
                x2: TypedArray::new(slice(Field::LineX2)?),
                y2: TypedArray::new(slice(Field::LineY2)?),
                color: TypedArray::new(slice(Field::LineColor)?),
            },
            texts: TextViews {
                count: TypedArray::new(slice(Field::TextCount)?),
                x: TypedArray::new(slice(Field::TextX)?),
                y: TypedArray::new(slice(Field::TextY)?),
                size: TypedArray::new(slice(Field::TextSize)?),
                color: TypedArray::new(slice(Field::TextColor)?),
                str_offset: TypedArray::new(slice(Field::TextStrOffset)?),
                str_len: TypedArray::new(slice(Field::TextStrLen)?),
            },
            string_buffer_len: TypedArray::new(slice(Field::StringBufferLen)?),
            strings: StringTable::new(slice(Field::StringBuffer)?),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RectViews<'a> {
    pub count: TypedArray<'a, u32>,
    pub x: TypedArray<'a, f32>,
    pub y: TypedArray<'a, f32>,
    pub w: TypedArray<'a, f32>,
    pub h: TypedArray<'a, f32>,
    pub color: TypedArray<'a, u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct CircleViews<'a> {
    pub count: TypedArray<'a, u32>,
    pub x: TypedArray<'a, f32>,
    pub y: TypedArray<'a, f32>,
    pub radius: TypedArray<'a, f32>,
    pub color: TypedArray<'a, u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct LineViews<'a> {
    pub count: TypedArray<'a, u32>,
    pub x1: TypedArray<'a, f32>,
    pub y1: TypedArray<'a, f32>,
    pub x2: TypedArray<'a, f32>,
    pub y2: TypedArray<'a, f32>,
    pub color: TypedArray<'a, u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct TextViews<'a> {
    pub count: TypedArray<'a, u32>,
    pub x: TypedArray<'a, f32>,
    pub y: TypedArray<'a, f32>,
    pub size: TypedArray<'a, i32>,
    pub color: TypedArray<'a, u8>,
    pub str_offset: TypedArray<'a, u16>,
    pub str_len: TypedArray<'a, u16>,
}

/// Every field of the command buffer, bound to live storage
#[derive(Debug, Clone, Copy)]
pub struct BoundViews<'a> {
    pub has_clear: TypedArray<'a, u8>,
    pub clear_color: TypedArray<'a, u8>,
    pub cmd_count: TypedArray<'a, u32>,
    pub cmd_stream: TypedArray<'a, u16>,
    pub rects: RectViews<'a>,
    pub circles: CircleViews<'a>,
    pub lines: LineViews<'a>,
    pub texts: TextViews<'a>,
    pub string_buffer_len: TypedArray<'a, u32>,
    pub strings: StringTable<'a>,
}

impl BoundViews<'_> {
    pub fn header(&self) -> Header {
        let scalar = |arr: &TypedArray<'_, u32>| arr.get(0).unwrap_or(0);
        Header {
            has_clear: self.has_clear.get(0).unwrap_or(0) != 0,
            clear_color: self.clear_color.get(0).unwrap_or(0),
            cmd_count: scalar(&self.cmd_count),
            rect_count: scalar(&self.rects.count),
            circle_count: scalar(&self.circles.count),
            line_count: scalar(&self.lines.count),
            text_count: scalar(&self.texts.count),
            string_buffer_len: scalar(&self.string_buffer_len),
        }
    }
}

/// Decoded header scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Header {
    pub has_clear: bool,
    pub clear_color: u8,
    pub cmd_count: u32,
    pub rect_count: u32,
    pub circle_count: u32,
    pub line_count: u32,
    pub text_count: u32,
    pub string_buffer_len: u32,
}

impl Header {
    /// Live slot count for a kind
    pub fn count(&self, kind: CommandKind) -> u32 {
        match kind {
            CommandKind::Rect => self.rect_count,
            CommandKind::Circle => self.circle_count,
            CommandKind::Line => self.line_count,
            CommandKind::Text => self.text_count,
        }
    }
}
