//! Producer interface: the module that fills the command buffer each frame

use std::borrow::Cow;
use std::ops::Range;

use serde::Serialize;

use crate::error::{HostError, Result};
use crate::memory::SharedRegion;
use crate::offsets::OffsetSource;
use crate::protocol::CMD_BUFFER_PTR_EXPORT;

mod native;
mod writer;

pub use native::{App, Frame, NativeProducer, SelfTestScene, SELF_TEST_EXPORT};
pub use writer::{field_offset, CommandBufferLayout, CommandWriter, BUFFER_ALIGN, BUFFER_SIZE};

/// Input forwarded to the producer's frame entry point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameInput {
    pub pointer_x: f32,
    pub pointer_y: f32,
    /// Bit `n` set while button `n` is held
    pub buttons: u32,
    /// Wheel delta accumulated since the previous frame
    pub wheel: f32,
}

/// Allocation counters reported by the producer, for leak detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Diagnostics {
    pub allocations: u64,
    pub deallocations: u64,
    pub bytes_live: u64,
}

impl Diagnostics {
    pub fn record_alloc(&mut self, len: usize) {
        self.allocations += 1;
        self.bytes_live += len as u64;
    }

    pub fn record_free(&mut self, len: usize) {
        self.deallocations += 1;
        self.bytes_live = self.bytes_live.saturating_sub(len as u64);
    }

    /// Allocations not yet released
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.deallocations)
    }
}

/// The module populating the shared command buffer.
///
/// All calls are synchronous and run to completion: while `frame` runs the
/// producer owns the region, afterwards the host reads it.
pub trait Producer: OffsetSource {
    type Memory: SharedRegion;

    /// Current shared region. May have been replaced by the last call.
    fn memory(&self) -> &Self::Memory;

    fn init(&mut self, imports: &HostImports) -> Result<()>;

    /// Advance one frame and repopulate the command buffer
    fn frame(&mut self, input: FrameInput, imports: &HostImports) -> Result<()>;

    /// Base address of the command buffer in the current region
    fn cmd_buffer_ptr(&self) -> Result<u32> {
        self.export(CMD_BUFFER_PTR_EXPORT)
            .ok_or_else(|| HostError::MissingAccessor {
                name: CMD_BUFFER_PTR_EXPORT.to_string(),
            })
    }

    fn diagnostics(&self) -> Option<Diagnostics> {
        None
    }

    /// Byte range of the region the host reads between calls. Called after
    /// every view rebuild; producers that copy memory need only copy this.
    fn watch(&mut self, _window: Range<usize>) {}

    /// Populate a fixed test scene, returning the command count.
    /// `None` when the producer has no self-test entry point.
    fn self_test(&mut self, _imports: &HostImports) -> Option<Result<u32>> {
        None
    }
}

/// Callbacks the host supplies to the producer. Messages are read out of the
/// producer's own memory by `(ptr, len)`.
#[derive(Debug, Clone)]
pub struct HostImports {
    target: &'static str,
}

impl Default for HostImports {
    fn default() -> Self {
        Self { target: "producer" }
    }
}

impl HostImports {
    pub fn log<R: SharedRegion + ?Sized>(&self, region: &R, ptr: u32, len: u32) {
        log::info!(target: self.target, "{}", read_message(region, ptr, len));
    }

    pub fn log_num(&self, num: i64) {
        log::info!(target: self.target, "{}", num);
    }

    pub fn dbg<R: SharedRegion + ?Sized>(
        &self,
        region: &R,
        loc_ptr: u32,
        loc_len: u32,
        msg_ptr: u32,
        msg_len: u32,
    ) {
        log::debug!(
            target: self.target,
            "[dbg] {}: {}",
            read_message(region, loc_ptr, loc_len),
            read_message(region, msg_ptr, msg_len)
        );
    }

    /// A failed producer assertion. Reported, not fatal.
    pub fn expect_failed<R: SharedRegion + ?Sized>(&self, region: &R, ptr: u32, len: u32) {
        log::error!(target: self.target, "[expect failed] {}", read_message(region, ptr, len));
    }

    /// Producer panic. The returned error must be propagated; the producer
    /// never resumes after calling this.
    pub fn throw_error<R: SharedRegion + ?Sized>(&self, region: &R, ptr: u32, len: u32) -> HostError {
        let msg = read_message(region, ptr, len).into_owned();
        log::error!(target: self.target, "[panic] {}", msg);
        HostError::ProducerPanic(msg)
    }
}

fn read_message<R: SharedRegion + ?Sized>(region: &R, ptr: u32, len: u32) -> Cow<'_, str> {
    let start = ptr as usize;
    let bytes = start
        .checked_add(len as usize)
        .and_then(|end| region.bytes().get(start..end));
    match bytes {
        Some(bytes) => String::from_utf8_lossy(bytes),
        None => Cow::Owned(format!("<message {}+{} out of bounds>", ptr, len)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LinearMemory;

    #[test]
    fn test_throw_error_reads_message_from_region() {
        let mut mem = LinearMemory::new(1, 1);
        mem.write(2048, b"index out of bounds").unwrap();

        let err = HostImports::default().throw_error(&mem, 2048, 19);
        assert_eq!(err, HostError::ProducerPanic("index out of bounds".into()));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_message_out_of_bounds() {
        let mem = LinearMemory::new(1, 1);
        let err = HostImports::default().throw_error(&mem, u32::MAX - 4, 8);
        match err {
            HostError::ProducerPanic(msg) => assert!(msg.contains("out of bounds")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_message_from_copied_bytes() {
        let bytes = b"[app.rs:3]   boom";
        let err = HostImports::default().throw_error(&bytes[..], 13, 4);
        assert_eq!(err, HostError::ProducerPanic("boom".into()));
    }

    #[test]
    fn test_diagnostics_counters() {
        let mut diag = Diagnostics::default();
        diag.record_alloc(100);
        diag.record_alloc(28);
        diag.record_free(100);
        assert_eq!(diag.allocations, 2);
        assert_eq!(diag.deallocations, 1);
        assert_eq!(diag.bytes_live, 28);
        assert_eq!(diag.outstanding(), 1);
    }
}
