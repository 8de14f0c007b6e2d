use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Read access to a static snapshot of memory.
pub trait MemoryImage {
    /// Return `length` bytes starting at `address`.
    ///
    /// Fails with [`Error::Unmapped`] if any byte of the range is not mapped.
    fn read_bytes(&self, address: u32, length: u32) -> Result<Vec<u8>>;
}

/// A single contiguous block of memory mapped at `base`.
#[derive(Debug, Clone, Default)]
pub struct FlatImage {
    base: u32,
    bytes: Vec<u8>,
}

impl FlatImage {
    pub fn new(base: u32, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// Load a raw memory dump from disk and map it at `base`.
    pub fn from_file(path: &Path, base: u32) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::from_io(path, e))?;
        Ok(Self::new(base, bytes))
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// One past the last mapped address.
    pub fn end(&self) -> u64 {
        u64::from(self.base) + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl MemoryImage for FlatImage {
    fn read_bytes(&self, address: u32, length: u32) -> Result<Vec<u8>> {
        let unmapped = || Error::Unmapped { address, length };
        if address < self.base {
            return Err(unmapped());
        }
        let start = (address - self.base) as usize;
        let end = start.checked_add(length as usize).ok_or_else(unmapped)?;
        self.bytes.get(start..end).map(<[u8]>::to_vec).ok_or_else(unmapped)
    }
}
