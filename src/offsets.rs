//! Offset table: byte offset of every command buffer field, relative to the
//! buffer's base pointer.
//!
//! Offsets are compiled into the producer. They survive memory growth (only the
//! backing storage moves) but not re-instantiation, so the table is queried
//! exactly once per producer instance.

use crate::error::{HostError, Result};
use crate::protocol::Field;

/// Anything exposing zero-argument `u32` exports by name
pub trait OffsetSource {
    /// Call the named zero-argument export, `None` if it does not exist
    fn export(&self, name: &str) -> Option<u32>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: [u32; Field::COUNT],
}

impl OffsetTable {
    /// Call one accessor per field. A missing accessor means the producer
    /// speaks a different protocol version and is fatal.
    pub fn query<S: OffsetSource + ?Sized>(source: &S) -> Result<Self> {
        let mut offsets = [0u32; Field::COUNT];
        for field in Field::ALL {
            let name = field.accessor();
            offsets[field.index()] = source
                .export(&name)
                .ok_or(HostError::MissingAccessor { name })?;
        }

        log::debug!("command buffer offsets loaded for {} fields", Field::COUNT);
        Ok(Self { offsets })
    }

    /// Build a table from a function, for producers that know their own layout
    pub fn from_fn(mut f: impl FnMut(Field) -> u32) -> Self {
        let mut offsets = [0u32; Field::COUNT];
        for field in Field::ALL {
            offsets[field.index()] = f(field);
        }
        Self { offsets }
    }

    #[inline]
    pub fn get(&self, field: Field) -> u32 {
        self.offsets[field.index()]
    }

    /// `(field name, offset)` pairs in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        Field::ALL
            .iter()
            .map(move |field| (field.name(), self.get(*field)))
    }

    /// One past the last byte any field occupies, saturating at the end of
    /// the 32-bit address space
    pub fn extent(&self) -> usize {
        Field::ALL
            .iter()
            .map(|field| {
                let len = u32::try_from(field.byte_len()).unwrap_or(u32::MAX);
                self.get(*field).saturating_add(len) as usize
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    struct Exports(FxHashMap<String, u32>);

    impl OffsetSource for Exports {
        fn export(&self, name: &str) -> Option<u32> {
            self.0.get(name).copied()
        }
    }

    fn full_exports() -> Exports {
        let mut map = FxHashMap::default();
        for (i, field) in Field::ALL.iter().enumerate() {
            map.insert(field.accessor(), (i * 16) as u32);
        }
        Exports(map)
    }

    #[test]
    fn test_query_reads_every_accessor() {
        let table = OffsetTable::query(&full_exports()).unwrap();
        assert_eq!(table.get(Field::HasClear), 0);
        assert_eq!(table.get(Field::RectX), (Field::RectX.index() * 16) as u32);
        assert_eq!(table.entries().count(), Field::COUNT);
    }

    #[test]
    fn test_missing_accessor_is_fatal() {
        let mut exports = full_exports();
        exports.0.remove("_get_offset_text_str_len");

        let err = OffsetTable::query(&exports).unwrap_err();
        assert_eq!(
            err,
            HostError::MissingAccessor {
                name: "_get_offset_text_str_len".into()
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_extent() {
        let table = OffsetTable::from_fn(|field| if field == Field::StringBuffer { 100 } else { 0 });
        assert_eq!(table.extent(), 100 + 8192);
    }

    #[test]
    fn test_extent_saturates() {
        let table = OffsetTable::from_fn(|field| if field == Field::CmdStream { u32::MAX - 8 } else { 0 });
        assert_eq!(table.extent(), u32::MAX as usize);
    }
}
