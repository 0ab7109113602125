//! Frame dispatcher: replays the command stream onto a surface
//!
//! Order of operations per frame:
//! 1. clear (if `has_clear`), never part of the stream
//! 2. `cmd_stream[0..cmd_count]` in index order, one paint per code
//!
//! No sorting, no batching. The only per-command work besides reading the
//! typed views is UTF-8 validation of text slices, which borrows.

use smallvec::SmallVec;

use crate::config::{HostConfig, ViolationPolicy};
use crate::error::{HostError, Result};
use crate::memory::{BoundViews, TypedArray};
use crate::protocol::{Color, Command, CommandKind, MAX_COMMANDS};
use crate::render::Surface;

/// Outcome of replaying one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Whether the surface was cleared first
    pub cleared: bool,
    /// Stream entries visited
    pub commands: u32,
    /// Paint operations issued (clear excluded)
    pub drawn: u32,
    /// Entries with a reserved kind tag, skipped
    pub skipped: u32,
    /// First few skipped codes, for diagnosis
    pub unknown_codes: SmallVec<[u16; 4]>,
    /// Contract violations tolerated under the lenient policy
    pub violations: u32,
    /// Whether the view set was rebuilt before reading
    pub rebuilt_views: bool,
}

impl FrameReport {
    fn skip_unknown(&mut self, code: u16) {
        self.skipped += 1;
        if self.unknown_codes.len() < self.unknown_codes.inline_size() {
            self.unknown_codes.push(code);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDispatcher {
    policy: ViolationPolicy,
    line_width: f32,
}

impl Default for FrameDispatcher {
    fn default() -> Self {
        Self::new(ViolationPolicy::default(), 1.0)
    }
}

impl FrameDispatcher {
    pub fn new(policy: ViolationPolicy, line_width: f32) -> Self {
        Self { policy, line_width }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.policy, config.line_width)
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Paint the frame described by `views` onto `surface`
    pub fn replay<S: Surface + ?Sized>(
        &self,
        views: &BoundViews<'_>,
        surface: &mut S,
    ) -> Result<FrameReport> {
        let header = views.header();
        let mut report = FrameReport::default();

        if header.has_clear {
            let color = self.color(header.clear_color, &mut report)?;
            surface.clear(color);
            report.cleared = true;
        }

        let cmd_count = self.clamp_count("cmd_count", header.cmd_count, MAX_COMMANDS, &mut report)?;
        let counts = [
            CommandKind::Rect,
            CommandKind::Circle,
            CommandKind::Line,
            CommandKind::Text,
        ]
        .map(|kind| (kind, header.count(kind)));
        let mut live = [0u32; 4];
        for (slot, (kind, count)) in live.iter_mut().zip(counts) {
            *slot = self.clamp_count(kind.count_field().name(), count, kind.capacity(), &mut report)?;
        }

        for (i, code) in views.cmd_stream.iter().take(cmd_count as usize).enumerate() {
            let cmd = Command::from_code(code);
            report.commands += 1;

            let Some(kind) = cmd.kind() else {
                log::trace!("skipping reserved command kind {} at {}", cmd.tag, i);
                report.skip_unknown(code);
                continue;
            };

            let count = live[kind.tag() as usize - 1];
            if u32::from(cmd.index) >= count {
                self.violation(
                    HostError::IndexOutOfRange {
                        kind: kind.name(),
                        index: cmd.index,
                        count,
                    },
                    &mut report,
                )?;
                continue;
            }

            if self.paint(kind, cmd.index as usize, views, surface, &mut report)? {
                report.drawn += 1;
            }
        }

        Ok(report)
    }

    /// Paint one command; `false` if it was skipped as a tolerated violation
    fn paint<S: Surface + ?Sized>(
        &self,
        kind: CommandKind,
        i: usize,
        views: &BoundViews<'_>,
        surface: &mut S,
        report: &mut FrameReport,
    ) -> Result<bool> {
        match kind {
            CommandKind::Rect => {
                let r = &views.rects;
                let color = self.color(at(&r.color, i), report)?;
                surface.fill_rect(at(&r.x, i), at(&r.y, i), at(&r.w, i), at(&r.h, i), color);
            }
            CommandKind::Circle => {
                let c = &views.circles;
                let color = self.color(at(&c.color, i), report)?;
                surface.fill_circle(at(&c.x, i), at(&c.y, i), at(&c.radius, i), color);
            }
            CommandKind::Line => {
                let l = &views.lines;
                let color = self.color(at(&l.color, i), report)?;
                surface.stroke_line(
                    at(&l.x1, i),
                    at(&l.y1, i),
                    at(&l.x2, i),
                    at(&l.y2, i),
                    self.line_width,
                    color,
                );
            }
            CommandKind::Text => {
                let t = &views.texts;
                let text = match views.strings.resolve(at(&t.str_offset, i), at(&t.str_len, i)) {
                    Ok(text) => text,
                    Err(err) => {
                        self.violation(err, report)?;
                        return Ok(false);
                    }
                };
                let color = self.color(at(&t.color, i), report)?;
                surface.fill_text(text, at(&t.x, i), at(&t.y, i), at(&t.size, i), color);
            }
        }
        Ok(true)
    }

    /// Palette lookup; out-of-range indices fall back to black when tolerated
    fn color(&self, index: u8, report: &mut FrameReport) -> Result<Color> {
        match Color::from_index(index) {
            Some(color) => Ok(color),
            None => {
                self.violation(HostError::InvalidColor(index), report)?;
                Ok(Color::Black)
            }
        }
    }

    fn clamp_count(
        &self,
        field: &'static str,
        count: u32,
        capacity: usize,
        report: &mut FrameReport,
    ) -> Result<u32> {
        if count as usize <= capacity {
            return Ok(count);
        }
        self.violation(
            HostError::CountOverCapacity {
                field,
                count,
                capacity,
            },
            report,
        )?;
        Ok(capacity as u32)
    }

    fn violation(&self, err: HostError, report: &mut FrameReport) -> Result<()> {
        match self.policy {
            ViolationPolicy::Strict => Err(err),
            ViolationPolicy::Lenient => {
                log::warn!("protocol violation tolerated: {}", err);
                report.violations += 1;
                Ok(())
            }
        }
    }
}

/// Slot read; in range by construction (index < count <= capacity)
#[inline]
fn at<T: crate::memory::Element + Default>(arr: &TypedArray<'_, T>, i: usize) -> T {
    arr.get(i).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LinearMemory, ViewSet};
    use crate::offsets::OffsetTable;
    use crate::producer::{field_offset, CommandWriter, BUFFER_ALIGN, BUFFER_SIZE};
    use crate::protocol::Field;
    use crate::render::{DrawOp, RecordingSurface};

    struct Fixture {
        mem: LinearMemory,
        base: u32,
        offsets: OffsetTable,
    }

    impl Fixture {
        fn new() -> Self {
            let mut mem = LinearMemory::new(1, 4);
            let base = mem.alloc(BUFFER_SIZE, BUFFER_ALIGN).unwrap();
            let mut fixture = Self {
                mem,
                base,
                offsets: OffsetTable::from_fn(|f| field_offset(f) as u32),
            };
            fixture.writer().reset();
            fixture
        }

        fn writer(&mut self) -> CommandWriter<'_> {
            CommandWriter::new(&mut self.mem, self.base)
        }

        fn poke(&mut self, field: Field, index: usize, bytes: &[u8]) {
            let at = self.base as usize + field_offset(field) + index * bytes.len();
            self.mem.write(at, bytes).unwrap();
        }

        fn replay(&self, policy: ViolationPolicy) -> (Result<FrameReport>, Vec<DrawOp>) {
            let views = ViewSet::build(&self.mem, self.base, &self.offsets).unwrap();
            let bound = views.bind(&self.mem).unwrap();
            let mut surface = RecordingSurface::new(800.0, 600.0);
            let result = FrameDispatcher::new(policy, 1.0).replay(&bound, &mut surface);
            (result, surface.take_ops())
        }
    }

    #[test]
    fn test_replay_in_stream_order_after_clear() {
        let mut fx = Fixture::new();
        {
            let mut w = fx.writer();
            w.text(5.0, 6.0, 18, Color::Orange, "hello");
            w.rect(1.0, 2.0, 3.0, 4.0, Color::Pink);
            w.clear(Color::RayWhite);
            w.line(0.0, 0.0, 9.0, 9.0, Color::Purple);
            w.circle(7.0, 8.0, 2.5, Color::Gray);
        }

        let (result, ops) = fx.replay(ViolationPolicy::Strict);
        let report = result.unwrap();
        assert!(report.cleared);
        assert_eq!(report.commands, 4);
        assert_eq!(report.drawn, 4);
        assert_eq!(
            ops,
            vec![
                DrawOp::Clear { color: Color::RayWhite },
                DrawOp::Text {
                    text: "hello".into(),
                    x: 5.0,
                    y: 6.0,
                    size: 18,
                    color: Color::Orange
                },
                DrawOp::Rect {
                    x: 1.0,
                    y: 2.0,
                    w: 3.0,
                    h: 4.0,
                    color: Color::Pink
                },
                DrawOp::Line {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 9.0,
                    y2: 9.0,
                    width: 1.0,
                    color: Color::Purple
                },
                DrawOp::Circle {
                    x: 7.0,
                    y: 8.0,
                    radius: 2.5,
                    color: Color::Gray
                },
            ]
        );
    }

    #[test]
    fn test_empty_frame() {
        let fx = Fixture::new();
        let (result, ops) = fx.replay(ViolationPolicy::Strict);
        assert_eq!(result.unwrap(), FrameReport::default());
        assert!(ops.is_empty());
    }

    #[test]
    fn test_reserved_kinds_skipped() {
        let mut fx = Fixture::new();
        {
            let mut w = fx.writer();
            w.rect(0.0, 0.0, 1.0, 1.0, Color::Red);
            w.emit_code(0x0000);
            w.emit_code(0x5001);
            w.emit_code(0xF123);
            w.circle(0.0, 0.0, 1.0, Color::Red);
        }

        for policy in [ViolationPolicy::Strict, ViolationPolicy::Lenient] {
            let (result, ops) = fx.replay(policy);
            let report = result.unwrap();
            assert_eq!(report.commands, 5);
            assert_eq!(report.drawn, 2);
            assert_eq!(report.skipped, 3);
            assert_eq!(report.unknown_codes.as_slice(), &[0x0000, 0x5001, 0xF123]);
            assert_eq!(report.violations, 0);
            assert_eq!(ops.len(), 2);
        }
    }

    #[test]
    fn test_index_beyond_count() {
        let mut fx = Fixture::new();
        {
            let mut w = fx.writer();
            w.rect(0.0, 0.0, 1.0, 1.0, Color::Red);
            w.emit_code(CommandKind::Rect.code(5));
        }

        let (result, _) = fx.replay(ViolationPolicy::Strict);
        assert_eq!(
            result.unwrap_err(),
            HostError::IndexOutOfRange {
                kind: "rect",
                index: 5,
                count: 1
            }
        );

        let (result, ops) = fx.replay(ViolationPolicy::Lenient);
        let report = result.unwrap();
        assert_eq!(report.drawn, 1);
        assert_eq!(report.violations, 1);
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn test_count_over_capacity() {
        let mut fx = Fixture::new();
        fx.writer().circle(1.0, 1.0, 1.0, Color::Blue);
        fx.poke(Field::CircleCount, 0, &5000u32.to_le_bytes());

        let (result, _) = fx.replay(ViolationPolicy::Strict);
        assert!(matches!(
            result.unwrap_err(),
            HostError::CountOverCapacity { field: "circle_count", count: 5000, .. }
        ));

        let (result, ops) = fx.replay(ViolationPolicy::Lenient);
        let report = result.unwrap();
        assert_eq!(report.violations, 1);
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn test_cmd_count_clamped() {
        let mut fx = Fixture::new();
        fx.writer().rect(0.0, 0.0, 1.0, 1.0, Color::Red);
        fx.poke(Field::CmdCount, 0, &u32::MAX.to_le_bytes());

        let (result, _) = fx.replay(ViolationPolicy::Lenient);
        let report = result.unwrap();
        // stale stream entries beyond the real command are zero codes
        assert_eq!(report.commands as usize, MAX_COMMANDS);
        assert_eq!(report.drawn, 1);
        assert!(report.violations >= 1);
    }

    #[test]
    fn test_invalid_color() {
        let mut fx = Fixture::new();
        fx.writer().rect(0.0, 0.0, 1.0, 1.0, Color::Red);
        fx.poke(Field::RectColor, 0, &[13]);

        let (result, _) = fx.replay(ViolationPolicy::Strict);
        assert_eq!(result.unwrap_err(), HostError::InvalidColor(13));

        let (result, ops) = fx.replay(ViolationPolicy::Lenient);
        assert_eq!(result.unwrap().violations, 1);
        assert_eq!(
            ops,
            vec![DrawOp::Rect {
                x: 0.0,
                y: 0.0,
                w: 1.0,
                h: 1.0,
                color: Color::Black
            }]
        );
    }

    #[test]
    fn test_text_slice_out_of_bounds() {
        let mut fx = Fixture::new();
        fx.writer().text(0.0, 0.0, 10, Color::White, "abc");
        fx.poke(Field::TextStrOffset, 0, &8190u16.to_le_bytes());

        let (result, _) = fx.replay(ViolationPolicy::Strict);
        assert!(matches!(
            result.unwrap_err(),
            HostError::StringOutOfBounds { offset: 8190, len: 3, .. }
        ));

        let (result, ops) = fx.replay(ViolationPolicy::Lenient);
        let report = result.unwrap();
        assert_eq!(report.drawn, 0);
        assert_eq!(report.violations, 1);
        assert!(ops.is_empty());
    }
}
