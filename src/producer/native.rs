//! In-process reference producer
//!
//! Hosts an [`App`] in a [`LinearMemory`] and exposes the same entry points a
//! compiled producer module would: offset accessors, the base pointer, init,
//! frame and the self-test scene. Used for headless runs and tests.

use std::ops::{Deref, DerefMut};

use rustc_hash::FxHashMap;

use crate::error::{HostError, Result};
use crate::memory::LinearMemory;
use crate::offsets::OffsetSource;
use crate::protocol::{Color, Field, CMD_BUFFER_PTR_EXPORT};

use super::writer::{field_offset, CommandWriter, BUFFER_ALIGN, BUFFER_SIZE};
use super::{Diagnostics, FrameInput, HostImports, Producer};

/// Name of the self-test entry point
pub const SELF_TEST_EXPORT: &str = "_test_draw_commands";

const INITIAL_PAGES: usize = 1;
const MAX_PAGES: usize = 256;

/// Application code driven by a [`NativeProducer`]
pub trait App {
    fn init(&mut self, _frame: &mut Frame<'_>) -> Result<()> {
        Ok(())
    }

    /// Draw one frame. The buffer has already been reset.
    fn frame(&mut self, input: &FrameInput, frame: &mut Frame<'_>) -> Result<()>;
}

impl<F> App for F
where
    F: FnMut(&FrameInput, &mut Frame<'_>) -> Result<()>,
{
    fn frame(&mut self, input: &FrameInput, frame: &mut Frame<'_>) -> Result<()> {
        self(input, frame)
    }
}

/// The fixed scene written by the self-test entry point
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfTestScene;

impl SelfTestScene {
    pub fn draw(writer: &mut CommandWriter<'_>) -> u32 {
        writer.clear(Color::Blue);
        writer.rect(10.0, 10.0, 100.0, 50.0, Color::Red);
        writer.circle(200.0, 100.0, 30.0, Color::Green);
        writer.line(300.0, 10.0, 400.0, 100.0, Color::Yellow);
        writer.text(10.0, 200.0, 32, Color::White, "Test");
        writer.cmd_count()
    }
}

impl App for SelfTestScene {
    fn frame(&mut self, _input: &FrameInput, frame: &mut Frame<'_>) -> Result<()> {
        Self::draw(frame);
        Ok(())
    }
}

/// Per-frame handle given to an [`App`]: the command writer plus the
/// producer's imports and allocator
pub struct Frame<'a> {
    writer: CommandWriter<'a>,
    imports: &'a HostImports,
    stats: &'a mut Diagnostics,
}

impl Frame<'_> {
    /// Allocate transient producer memory. May grow the shared region.
    pub fn scratch(&mut self, len: usize) -> Result<u32> {
        let ptr = self.writer.memory_mut().alloc(len, 8)?;
        self.stats.record_alloc(len);
        Ok(ptr)
    }

    pub fn release(&mut self, ptr: u32, len: usize) {
        self.writer.memory_mut().free(ptr, len);
        self.stats.record_free(len);
    }

    /// Log through the host's `log` import
    pub fn log(&mut self, msg: &str) -> Result<()> {
        let ptr = self.stage(msg)?;
        self.imports.log(self.writer.memory(), ptr, msg.len() as u32);
        self.release(ptr, msg.len());
        Ok(())
    }

    /// Abort through the host's `throw_error` import. Return the result.
    pub fn panic(&mut self, msg: &str) -> HostError {
        match self.stage(msg) {
            Ok(ptr) => {
                let err = self.imports.throw_error(self.writer.memory(), ptr, msg.len() as u32);
                self.release(ptr, msg.len());
                err
            }
            Err(err) => err,
        }
    }

    fn stage(&mut self, msg: &str) -> Result<u32> {
        let ptr = self.scratch(msg.len())?;
        self.writer.memory_mut().write(ptr as usize, msg.as_bytes())?;
        Ok(ptr)
    }
}

impl<'a> Deref for Frame<'a> {
    type Target = CommandWriter<'a>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl DerefMut for Frame<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

/// Reference producer owning its linear memory
pub struct NativeProducer<A> {
    memory: LinearMemory,
    base: u32,
    app: A,
    exports: FxHashMap<String, u32>,
    stats: Diagnostics,
    has_self_test: bool,
    frames: u64,
}

impl<A: App> NativeProducer<A> {
    /// Instantiate: allocate the command buffer and publish the export table
    pub fn new(app: A) -> Result<Self> {
        let mut memory = LinearMemory::new(INITIAL_PAGES, MAX_PAGES);
        let base = memory.alloc(BUFFER_SIZE, BUFFER_ALIGN)?;
        let mut stats = Diagnostics::default();
        stats.record_alloc(BUFFER_SIZE);

        let mut exports = FxHashMap::default();
        for field in Field::ALL {
            exports.insert(field.accessor(), field_offset(field) as u32);
        }
        exports.insert(CMD_BUFFER_PTR_EXPORT.to_string(), base);

        Ok(Self {
            memory,
            base,
            app,
            exports,
            stats,
            has_self_test: true,
            frames: 0,
        })
    }

    /// Remove an export, emulating a producer built for another protocol
    pub fn without_export(mut self, name: &str) -> Self {
        if name == SELF_TEST_EXPORT {
            self.has_self_test = false;
        }
        self.exports.remove(name);
        self
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Direct memory access, for tests that corrupt or grow the region
    pub fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    fn frame_handle<'a>(
        memory: &'a mut LinearMemory,
        base: u32,
        imports: &'a HostImports,
        stats: &'a mut Diagnostics,
    ) -> Frame<'a> {
        let mut writer = CommandWriter::new(memory, base);
        writer.reset();
        Frame {
            writer,
            imports,
            stats,
        }
    }
}

impl<A> OffsetSource for NativeProducer<A> {
    fn export(&self, name: &str) -> Option<u32> {
        self.exports.get(name).copied()
    }
}

impl<A: App> Producer for NativeProducer<A> {
    type Memory = LinearMemory;

    fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    fn init(&mut self, imports: &HostImports) -> Result<()> {
        let mut frame = Self::frame_handle(&mut self.memory, self.base, imports, &mut self.stats);
        self.app.init(&mut frame)
    }

    fn frame(&mut self, input: FrameInput, imports: &HostImports) -> Result<()> {
        let mut frame = Self::frame_handle(&mut self.memory, self.base, imports, &mut self.stats);
        self.app.frame(&input, &mut frame)?;
        if frame.dropped() > 0 {
            log::warn!("frame {}: {} commands dropped at capacity", self.frames, frame.dropped());
        }
        self.frames += 1;
        Ok(())
    }

    fn diagnostics(&self) -> Option<Diagnostics> {
        Some(self.stats)
    }

    fn self_test(&mut self, imports: &HostImports) -> Option<Result<u32>> {
        if !self.has_self_test {
            return None;
        }
        let mut frame = Self::frame_handle(&mut self.memory, self.base, imports, &mut self.stats);
        Some(Ok(SelfTestScene::draw(&mut frame)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SharedRegion;
    use crate::offsets::OffsetTable;

    fn idle(_: &FrameInput, _: &mut Frame<'_>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_exports_every_accessor() {
        let producer = NativeProducer::new(idle).unwrap();
        let table = OffsetTable::query(&producer).unwrap();
        assert_eq!(table.get(Field::RectX) as usize, field_offset(Field::RectX));
        assert!(producer.cmd_buffer_ptr().unwrap() > 0);
    }

    #[test]
    fn test_without_export() {
        let producer = NativeProducer::new(idle).unwrap().without_export("_get_offset_cmd_count");
        assert!(matches!(
            OffsetTable::query(&producer),
            Err(HostError::MissingAccessor { .. })
        ));
    }

    #[test]
    fn test_scratch_growth_and_leak_counters() {
        let mut producer = NativeProducer::new(|_: &FrameInput, frame: &mut Frame<'_>| -> Result<()> {
            let ptr = frame.scratch(3 * crate::memory::PAGE_SIZE)?;
            frame.release(ptr, 3 * crate::memory::PAGE_SIZE);
            Ok(())
        })
        .unwrap();
        let before = producer.memory().generation();
        let imports = HostImports::default();

        producer.frame(FrameInput::default(), &imports).unwrap();
        assert_ne!(producer.memory().generation(), before);
        let diag = producer.diagnostics().unwrap();
        assert_eq!(diag.allocations, 2);
        assert_eq!(diag.deallocations, 1);
        assert_eq!(diag.bytes_live, BUFFER_SIZE as u64);
    }

    #[test]
    fn test_panic_routes_through_throw_error() {
        let mut producer = NativeProducer::new(|_: &FrameInput, frame: &mut Frame<'_>| -> Result<()> {
            frame.log("about to fail")?;
            Err(frame.panic("unreachable state"))
        })
        .unwrap();

        let err = producer
            .frame(FrameInput::default(), &HostImports::default())
            .unwrap_err();
        assert_eq!(err, HostError::ProducerPanic("unreachable state".into()));

        let diag = producer.diagnostics().unwrap();
        assert_eq!(diag.outstanding(), 1);
        assert_eq!(diag.bytes_live, BUFFER_SIZE as u64);
    }

    #[test]
    fn test_self_test_populates_scene() {
        let mut producer = NativeProducer::new(idle).unwrap();
        let count = producer.self_test(&HostImports::default()).unwrap().unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_self_test_absent_without_export() {
        let mut producer = NativeProducer::new(idle).unwrap().without_export(SELF_TEST_EXPORT);
        assert!(producer.self_test(&HostImports::default()).is_none());
    }
}
