//! Canvas host: a zero-copy command buffer bridge between a drawing producer
//! and a 2D surface
//!
//! The producer (normally a compiled module with its own linear memory)
//! writes one frame of draw commands into a fields-of-arrays block; the host
//! reads that block in place and replays it in order:
//! - Offsets are queried once per instantiation
//! - Typed views are rebuilt only when the producer's memory is replaced
//! - Text is decoded straight out of the producer's string table
//! - Codes with an unknown kind tag are skipped

pub mod config;
pub mod error;
pub mod input;
pub mod memory;
pub mod offsets;
pub mod producer;
pub mod protocol;
pub mod render;
pub mod strings;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::WasmHost;

pub use config::{HostConfig, ViolationPolicy};
pub use error::{HostError, Result};
pub use input::InputState;
pub use memory::{BoundViews, Generation, Header, LinearMemory, SharedRegion, ViewSet};
pub use offsets::{OffsetSource, OffsetTable};
pub use producer::{
    App, Diagnostics, Frame, FrameInput, HostImports, NativeProducer, Producer, SelfTestScene,
};
pub use protocol::{Color, Command, CommandKind, Field};
pub use render::{DrawOp, FrameDispatcher, FrameReport, RecordingSurface, Surface};

use producer::SELF_TEST_EXPORT;

/// Decides whether another frame should be produced
pub trait FrameScheduler {
    /// Block until the next display refresh; `false` ends the loop
    fn next_tick(&mut self) -> bool;
}

/// Headless scheduler granting a fixed number of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFrames(pub u64);

impl FrameScheduler for FixedFrames {
    fn next_tick(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        true
    }
}

/// A live producer plus everything needed to paint its frames
pub struct Host<P: Producer> {
    producer: P,
    imports: HostImports,
    offsets: OffsetTable,
    views: ViewSet,
    input: InputState,
    dispatcher: FrameDispatcher,
    frames: u64,
    rebuilds: u64,
    halted: Option<HostError>,
}

impl<P: Producer> Host<P> {
    /// Start a session: query offsets, initialize the producer, build views
    pub fn new(mut producer: P, config: &HostConfig) -> Result<Self> {
        let imports = HostImports::default();
        let offsets = OffsetTable::query(&producer)?;
        producer.init(&imports)?;

        let base = producer.cmd_buffer_ptr()?;
        let views = ViewSet::build(producer.memory(), base, &offsets)?;
        producer.watch(views.window());
        log::info!(
            "host ready: command buffer at {}, {} bytes of shared memory",
            base,
            producer.memory().len()
        );

        Ok(Self {
            producer,
            imports,
            offsets,
            views,
            input: InputState::new(),
            dispatcher: FrameDispatcher::from_config(config),
            frames: 0,
            rebuilds: 0,
            halted: None,
        })
    }

    /// Run the producer for one frame and paint the result.
    ///
    /// Any error stops the session: every later call returns
    /// [`HostError::Halted`].
    pub fn frame<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<FrameReport> {
        self.guarded(|host| host.advance(surface))
    }

    /// Refuse to touch a halted producer; latch the first error of `step`
    fn guarded<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if let Some(cause) = &self.halted {
            return Err(HostError::Halted(cause.to_string()));
        }

        step(self).map_err(|err| {
            log::error!("render loop halted at frame {}: {}", self.frames, err);
            self.halted = Some(err.clone());
            err
        })
    }

    fn advance<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<FrameReport> {
        let input = self.input.take_frame_input();
        self.producer.frame(input, &self.imports)?;

        let rebuilt = self.refresh_views()?;
        let bound = self.views.bind(self.producer.memory())?;
        let mut report = self.dispatcher.replay(&bound, surface)?;
        report.rebuilt_views = rebuilt;

        self.frames += 1;
        Ok(report)
    }

    /// Re-read the base pointer and rebuild views if the region or the
    /// buffer moved. Returns whether a rebuild happened.
    fn refresh_views(&mut self) -> Result<bool> {
        let base = self.producer.cmd_buffer_ptr()?;
        let memory = self.producer.memory();
        if self.views.is_attached(memory) && self.views.base() == base {
            return Ok(false);
        }

        log::debug!(
            "shared memory changed (generation {} -> {}), rebuilding views",
            self.views.generation().0,
            memory.generation().0
        );
        self.views.rebuild(memory, base, &self.offsets)?;
        self.producer.watch(self.views.window());
        self.rebuilds += 1;
        Ok(true)
    }

    /// Drive frames until the scheduler stops granting ticks. Returns the
    /// number of frames painted.
    pub fn run<S, T>(&mut self, surface: &mut S, scheduler: &mut T) -> Result<u64>
    where
        S: Surface + ?Sized,
        T: FrameScheduler + ?Sized,
    {
        let mut painted = 0;
        while scheduler.next_tick() {
            self.frame(surface)?;
            painted += 1;
        }
        Ok(painted)
    }

    /// Have the producer write its fixed test scene; returns its command
    /// count. Halts like [`Host::frame`] on failure.
    pub fn self_test(&mut self) -> Result<u32> {
        self.guarded(|host| {
            let count = host
                .producer
                .self_test(&host.imports)
                .ok_or_else(|| HostError::MissingAccessor {
                    name: SELF_TEST_EXPORT.to_string(),
                })??;
            host.refresh_views()?;
            Ok(count)
        })
    }

    /// Header scalars as last written
    pub fn header(&self) -> Result<Header> {
        Ok(self.views()?.header())
    }

    /// Current typed views. Fails if the producer's memory was replaced
    /// since the last frame.
    pub fn views(&self) -> Result<BoundViews<'_>> {
        self.views.bind(self.producer.memory())
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    pub fn cmd_buffer_ptr(&self) -> u32 {
        self.views.base()
    }

    pub fn diagnostics(&self) -> Option<Diagnostics> {
        self.producer.diagnostics()
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    /// Frames painted so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// View set rebuilds since start
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// End the session, handing the producer back
    pub fn into_producer(self) -> P {
        if let Some(diag) = self.producer.diagnostics() {
            // the command buffer itself stays allocated
            if diag.outstanding() > 1 {
                log::warn!("producer shut down with {} live allocations", diag.outstanding());
            }
        }
        self.producer
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;
    use crate::memory::PAGE_SIZE;
    use crate::producer::{field_offset, CommandWriter, BUFFER_ALIGN, BUFFER_SIZE};
    use crate::protocol::CMD_BUFFER_PTR_EXPORT;

    fn idle(_: &FrameInput, _: &mut Frame<'_>) -> Result<()> {
        Ok(())
    }

    fn host<A: App>(app: A) -> Host<NativeProducer<A>> {
        Host::new(NativeProducer::new(app).unwrap(), &HostConfig::default()).unwrap()
    }

    /// Remembers the input of every frame
    #[derive(Default)]
    struct Recorder(Vec<FrameInput>);

    impl App for Recorder {
        fn frame(&mut self, input: &FrameInput, frame: &mut Frame<'_>) -> Result<()> {
            self.0.push(*input);
            frame.circle(input.pointer_x, input.pointer_y, 4.0, Color::Orange);
            Ok(())
        }
    }

    /// Writes each frame into the other of two command buffers
    struct Relocating {
        memory: LinearMemory,
        bases: [u32; 2],
        frames: usize,
        watched: Vec<Range<usize>>,
    }

    impl Relocating {
        fn new() -> Self {
            let mut memory = LinearMemory::new(1, 16);
            let first = memory.alloc(BUFFER_SIZE, BUFFER_ALIGN).unwrap();
            let second = memory.alloc(BUFFER_SIZE, BUFFER_ALIGN).unwrap();
            Self {
                memory,
                bases: [first, second],
                frames: 0,
                watched: Vec::new(),
            }
        }

        fn base(&self) -> u32 {
            self.bases[self.frames % 2]
        }
    }

    impl OffsetSource for Relocating {
        fn export(&self, name: &str) -> Option<u32> {
            if name == CMD_BUFFER_PTR_EXPORT {
                return Some(self.base());
            }
            Field::ALL
                .iter()
                .find(|field| field.accessor() == name)
                .map(|field| field_offset(*field) as u32)
        }
    }

    impl Producer for Relocating {
        type Memory = LinearMemory;

        fn memory(&self) -> &LinearMemory {
            &self.memory
        }

        fn init(&mut self, _: &HostImports) -> Result<()> {
            CommandWriter::new(&mut self.memory, self.bases[0]).reset();
            Ok(())
        }

        fn frame(&mut self, _: FrameInput, _: &HostImports) -> Result<()> {
            self.frames += 1;
            let base = self.base();
            let mut writer = CommandWriter::new(&mut self.memory, base);
            writer.reset();
            writer.rect(self.frames as f32, 0.0, 1.0, 1.0, Color::Purple);
            Ok(())
        }

        fn watch(&mut self, window: Range<usize>) {
            self.watched.push(window);
        }
    }

    #[test]
    fn test_frame_paints_producer_output() {
        let mut host = host(|_: &FrameInput, frame: &mut Frame<'_>| -> Result<()> {
            frame.clear(Color::RayWhite);
            frame.text(20.0, 40.0, 24, Color::DarkGray, "score: 10");
            frame.rect(0.0, 0.0, 8.0, 8.0, Color::Red);
            Ok(())
        });

        let mut surface = RecordingSurface::new(320.0, 240.0);
        let report = host.frame(&mut surface).unwrap();
        assert!(report.cleared);
        assert_eq!(report.drawn, 2);
        assert!(!report.rebuilt_views);
        assert_eq!(surface.ops()[0], DrawOp::Clear { color: Color::RayWhite });
        assert!(matches!(&surface.ops()[1], DrawOp::Text { text, .. } if text == "score: 10"));
        assert_eq!(host.frames(), 1);
    }

    #[test]
    fn test_views_rebuilt_after_growth_mid_frame() {
        let mut host = host(|input: &FrameInput, frame: &mut Frame<'_>| -> Result<()> {
            if input.buttons & 1 != 0 {
                frame.scratch(2 * PAGE_SIZE)?;
            }
            frame.rect(1.0, 2.0, 3.0, 4.0, Color::Green);
            Ok(())
        });
        let mut surface = RecordingSurface::new(100.0, 100.0);

        host.frame(&mut surface).unwrap();
        host.input_mut().button_down(0);
        let report = host.frame(&mut surface).unwrap();

        assert!(report.rebuilt_views);
        assert_eq!(host.rebuilds(), 1);
        assert_eq!(
            surface.take_ops().last(),
            Some(&DrawOp::Rect {
                x: 1.0,
                y: 2.0,
                w: 3.0,
                h: 4.0,
                color: Color::Green
            })
        );
        assert_eq!(host.header().unwrap().rect_count, 1);
    }

    #[test]
    fn test_views_follow_moved_buffer() {
        let mut host = Host::new(Relocating::new(), &HostConfig::default()).unwrap();
        let generation = host.producer().memory().generation();
        let mut surface = RecordingSurface::new(10.0, 10.0);

        for frame in 1..=3 {
            let report = host.frame(&mut surface).unwrap();
            assert!(report.rebuilt_views);
            assert_eq!(host.cmd_buffer_ptr(), host.producer().base());
            assert_eq!(
                surface.take_ops(),
                vec![DrawOp::Rect {
                    x: frame as f32,
                    y: 0.0,
                    w: 1.0,
                    h: 1.0,
                    color: Color::Purple
                }]
            );
        }

        assert_eq!(host.producer().memory().generation(), generation);
        assert_eq!(host.rebuilds(), 3);
        let watched = &host.producer().watched;
        assert_eq!(watched.len(), 4);
        assert_eq!(watched.last(), Some(&host.views.window()));
        assert_eq!(watched[1].start, host.producer().bases[1] as usize);
    }

    #[test]
    fn test_producer_panic_halts_loop() {
        let mut host = host(|_: &FrameInput, frame: &mut Frame<'_>| -> Result<()> {
            Err(frame.panic("attempt to divide by zero"))
        });
        let mut surface = RecordingSurface::new(10.0, 10.0);

        let err = host.frame(&mut surface).unwrap_err();
        assert_eq!(err, HostError::ProducerPanic("attempt to divide by zero".into()));
        assert!(host.is_halted());

        let again = host.frame(&mut surface).unwrap_err();
        assert!(matches!(again, HostError::Halted(msg) if msg.contains("divide by zero")));
        assert_eq!(host.frames(), 0);
        assert_eq!(host.producer().frames(), 0);
    }

    #[test]
    fn test_self_test_refused_after_halt() {
        let mut host = host(|_: &FrameInput, frame: &mut Frame<'_>| -> Result<()> {
            Err(frame.panic("stack overflow"))
        });
        let mut surface = RecordingSurface::new(10.0, 10.0);

        assert!(host.frame(&mut surface).is_err());
        let err = host.self_test().unwrap_err();
        assert!(matches!(err, HostError::Halted(msg) if msg.contains("stack overflow")));
        assert_eq!(host.header().unwrap().cmd_count, 0);
    }

    #[test]
    fn test_input_forwarded_and_wheel_reset() {
        let mut host = host(Recorder::default());
        let mut surface = RecordingSurface::new(10.0, 10.0);

        host.input_mut().pointer_moved(30.0, 40.0, (10.0, 10.0));
        host.input_mut().wheel(3.0);
        host.frame(&mut surface).unwrap();
        host.frame(&mut surface).unwrap();

        let seen = &host.producer().app().0;
        assert_eq!(seen.len(), 2);
        assert_eq!((seen[0].pointer_x, seen[0].pointer_y), (20.0, 30.0));
        assert_eq!(seen[0].wheel, 3.0);
        assert_eq!(seen[1].wheel, 0.0);
    }

    #[test]
    fn test_missing_accessor_is_fatal_at_start() {
        let producer = NativeProducer::new(idle)
            .unwrap()
            .without_export("_get_offset_text_str_len");
        let err = Host::new(producer, &HostConfig::default()).err().unwrap();
        assert_eq!(
            err,
            HostError::MissingAccessor {
                name: "_get_offset_text_str_len".into()
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_run_fixed_frames() {
        let mut host = host(Recorder::default());
        let mut surface = RecordingSurface::new(10.0, 10.0);
        let painted = host.run(&mut surface, &mut FixedFrames(5)).unwrap();
        assert_eq!(painted, 5);
        assert_eq!(surface.ops().len(), 5);
        assert_eq!(host.into_producer().frames(), 5);
    }

    #[test]
    fn test_self_test_requires_export() {
        let producer = NativeProducer::new(idle).unwrap().without_export(SELF_TEST_EXPORT);
        let mut host = Host::new(producer, &HostConfig::default()).unwrap();
        assert!(matches!(host.self_test(), Err(HostError::MissingAccessor { .. })));
        assert!(host.is_halted());
    }
}
