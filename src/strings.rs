//! String table: text payloads referenced by `(offset, length)` pairs

use crate::error::{HostError, Result};

/// Borrowed view of the producer's string table for the current frame
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    bytes: &'a [u8],
}

impl<'a> StringTable<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Resolve a text slice. Out-of-range slices are a producer fault and are
    /// reported, never truncated. Decoding borrows; nothing is allocated.
    pub fn resolve(&self, offset: u16, len: u16) -> Result<&'a str> {
        let start = offset as usize;
        let end = start + len as usize;
        let slice = self.bytes.get(start..end).ok_or(HostError::StringOutOfBounds {
            offset,
            len,
            capacity: self.bytes.len(),
        })?;
        std::str::from_utf8(slice).map_err(|_| HostError::InvalidUtf8 { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[..4].copy_from_slice(b"Test");
        bytes[4..16].copy_from_slice("Привет".as_bytes());
        bytes
    }

    #[test]
    fn test_resolve() {
        let bytes = table();
        let strings = StringTable::new(&bytes);
        assert_eq!(strings.resolve(0, 4).unwrap(), "Test");
        assert_eq!(strings.resolve(4, 12).unwrap(), "Привет");
        assert_eq!(strings.resolve(10, 0).unwrap(), "");
    }

    #[test]
    fn test_resolve_at_capacity_edge() {
        let bytes = table();
        let strings = StringTable::new(&bytes);
        assert!(strings.resolve(60, 4).is_ok());
        assert_eq!(
            strings.resolve(60, 5),
            Err(HostError::StringOutOfBounds {
                offset: 60,
                len: 5,
                capacity: 64
            })
        );
    }

    #[test]
    fn test_resolve_rejects_split_code_point() {
        let bytes = table();
        let strings = StringTable::new(&bytes);
        // "П" is two bytes; cutting after one is not UTF-8
        assert_eq!(strings.resolve(4, 1), Err(HostError::InvalidUtf8 { offset: 4 }));
    }
}
