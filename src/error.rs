//! Error taxonomy for the host runtime

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The producer does not export an accessor this protocol version needs.
    #[error("producer is missing accessor `{name}`; incompatible command buffer protocol")]
    MissingAccessor { name: String },

    #[error("failed to load producer module `{module}`: {reason}")]
    ModuleLoad { module: String, reason: String },

    /// Raised through the `throw_error` import. Producer state is no longer trusted.
    #[error("producer panic: {0}")]
    ProducerPanic(String),

    #[error("render loop halted after fatal error: {0}")]
    Halted(String),

    #[error("view set built for generation {built} read against generation {current}")]
    StaleViews { built: u64, current: u64 },

    #[error("view `{field}` at {start}..{end} exceeds shared region of {region_len} bytes")]
    ViewOutOfBounds {
        field: &'static str,
        start: usize,
        end: usize,
        region_len: usize,
    },

    #[error("`{field}` is {count}, exceeds capacity {capacity}")]
    CountOverCapacity {
        field: &'static str,
        count: u32,
        capacity: usize,
    },

    #[error("{kind} index {index} out of range (count {count})")]
    IndexOutOfRange {
        kind: &'static str,
        index: u16,
        count: u32,
    },

    #[error("string slice {offset}+{len} exceeds string table capacity {capacity}")]
    StringOutOfBounds {
        offset: u16,
        len: u16,
        capacity: usize,
    },

    #[error("string slice at {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: u16 },

    #[error("color index {0} outside palette")]
    InvalidColor(u8),

    #[error("out of memory allocating {len} bytes")]
    OutOfMemory { len: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HostError {
    /// Producer-side faults stop the render loop for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::ProducerPanic(_)
                | HostError::Halted(_)
                | HostError::MissingAccessor { .. }
                | HostError::ModuleLoad { .. }
                | HostError::OutOfMemory { .. }
        )
    }

    /// Errors a conformant producer can never cause.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            HostError::CountOverCapacity { .. }
                | HostError::IndexOutOfRange { .. }
                | HostError::StringOutOfBounds { .. }
                | HostError::InvalidUtf8 { .. }
                | HostError::InvalidColor(_)
                | HostError::ViewOutOfBounds { .. }
        )
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Config(err.to_string())
    }
}
