//! Signature library: `(hash, size, name)` records used to name functions.
//!
//! A signature is computed over a function's instruction words with padding
//! skipped and every word passed through [`InstructionSet::signature_mask`],
//! so the same function linked at a different address hashes identically.
//!
//! File layout (all integers big-endian):
//!
//! ```text
//! magic   "SYMSIG\0\0"
//! version u32
//! count   u32
//! count × { hash u64, size u32, name_len u16, name [u8; name_len] }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::{NoopObserver, Progress, ScanObserver};
use crate::backends::{InsnClass, InstructionSet, MemoryImage, Words};
use crate::db::{body_of, SymbolDb};
use crate::error::{Error, Result};
use crate::model::is_placeholder;
use crate::services::util::write_atomically;

pub const MAGIC: [u8; 8] = *b"SYMSIG\0\0";

/// Current signature file version. Files with any other version are rejected.
pub const VERSION: u32 = 1;

/// One known function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub hash: u64,
    pub size: u32,
    pub name: String,
}

/// Counters returned by the hashing passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashReport {
    /// Functions hashed into records (initialize) or renamed (apply).
    pub matched: usize,
    /// Functions skipped because their body could not be read.
    pub unreadable: usize,
    /// The observer asked to stop early.
    pub cancelled: bool,
}

/// Ordered, immutable collection of signature records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDb {
    records: Vec<SignatureRecord>,
    index: HashMap<(u64, u32), usize>,
}

/// Hash a function body for signature matching.
pub fn hash_body(bytes: &[u8], base: u32, isa: &dyn InstructionSet) -> u64 {
    let mut hasher = Sha256::new();
    for (address, word) in Words::new(isa, bytes, base) {
        if isa.classify(word, address) == InsnClass::Padding {
            continue;
        }
        hasher.update(isa.signature_mask(word).to_be_bytes());
    }
    let digest = hasher.finalize();
    BigEndian::read_u64(&digest[..8])
}

impl SignatureDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; when two records share `(hash, size)` the first wins.
    pub fn from_records(records: Vec<SignatureRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            index.entry((record.hash, record.size)).or_insert(i);
        }
        Self { records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SignatureRecord] {
        &self.records
    }

    pub fn find(&self, hash: u64, size: u32) -> Option<&SignatureRecord> {
        self.index.get(&(hash, size)).map(|&i| &self.records[i])
    }

    /// Load a signature file.
    ///
    /// Fails with [`Error::NotFound`] when absent and [`Error::Format`] when
    /// the magic, version or record stream is not understood.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::from_io(path, e))?;
        let bad = |reason: String| Error::Format { path: path.to_path_buf(), reason };

        let mut cursor = Cursor::new(bytes.as_slice());
        let mut magic = [0u8; 8];
        cursor.read_exact(&mut magic).map_err(|_| bad("missing header".into()))?;
        if magic != MAGIC {
            return Err(bad("bad magic; not a signature file".into()));
        }
        let version = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| bad("missing version field".into()))?;
        if version != VERSION {
            return Err(bad(format!("unsupported version {version} (expected {VERSION})")));
        }

        let count = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| bad("missing record count".into()))?;
        let mut records = Vec::new();
        for i in 0..count {
            let record =
                read_record(&mut cursor).map_err(|e| bad(format!("record {i}: {e}")))?;
            records.push(record);
        }
        if (cursor.position() as usize) != bytes.len() {
            return Err(bad("trailing bytes after last record".into()));
        }
        Ok(Self::from_records(records))
    }

    /// Write the records atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, |w| self.write_to(w))
    }

    fn write_to(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let count = u32::try_from(self.records.len()).map_err(std::io::Error::other)?;
        w.write_all(&MAGIC)?;
        w.write_u32::<BigEndian>(VERSION)?;
        w.write_u32::<BigEndian>(count)?;
        for record in &self.records {
            let name_len = u16::try_from(record.name.len()).map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("signature name too long: {} bytes", record.name.len()),
                )
            })?;
            w.write_u64::<BigEndian>(record.hash)?;
            w.write_u32::<BigEndian>(record.size)?;
            w.write_u16::<BigEndian>(name_len)?;
            w.write_all(record.name.as_bytes())?;
        }
        Ok(())
    }

    /// Hash every function in `db` whose name starts with `prefix`
    /// (empty prefix = all functions).
    pub fn initialize(
        db: &SymbolDb,
        image: &dyn MemoryImage,
        isa: &dyn InstructionSet,
        prefix: &str,
    ) -> Self {
        Self::initialize_with(db, image, isa, prefix, &mut NoopObserver, usize::MAX).0
    }

    /// [`SignatureDb::initialize`] with progress reporting and cancellation.
    pub fn initialize_with(
        db: &SymbolDb,
        image: &dyn MemoryImage,
        isa: &dyn InstructionSet,
        prefix: &str,
        observer: &mut dyn ScanObserver,
        progress_interval: usize,
    ) -> (Self, HashReport) {
        let mut report = HashReport::default();
        let mut progress = Progress::new(observer, progress_interval);
        let mut records = Vec::new();

        for function in db.functions().filter(|f| f.name.starts_with(prefix)) {
            if progress.cancelled() {
                report.cancelled = true;
                break;
            }
            let Ok(bytes) = body_of(function, image) else {
                report.unreadable += 1;
                continue;
            };
            records.push(SignatureRecord {
                hash: hash_body(&bytes, function.address, isa),
                size: function.size,
                name: function.name.clone(),
            });
            report.matched += 1;
            progress.tick(report.matched);
        }

        progress.finish(report.matched);
        (Self::from_records(records), report)
    }

    /// Rename every function in `db` that still has a placeholder name and
    /// whose `(hash, size)` is known. Returns the number of renamed symbols.
    ///
    /// Already-resolved names are never touched, so a second run matches nothing.
    pub fn apply(
        &self,
        db: &mut SymbolDb,
        image: &dyn MemoryImage,
        isa: &dyn InstructionSet,
    ) -> usize {
        self.apply_with(db, image, isa, &mut NoopObserver, usize::MAX).matched
    }

    /// [`SignatureDb::apply`] with progress reporting and cancellation.
    pub fn apply_with(
        &self,
        db: &mut SymbolDb,
        image: &dyn MemoryImage,
        isa: &dyn InstructionSet,
        observer: &mut dyn ScanObserver,
        progress_interval: usize,
    ) -> HashReport {
        let mut report = HashReport::default();
        let mut progress = Progress::new(observer, progress_interval);
        let mut renames = Vec::new();
        let mut processed = 0;

        if !self.is_empty() {
            for function in db.functions().filter(|f| f.has_placeholder_name()) {
                if progress.cancelled() {
                    report.cancelled = true;
                    break;
                }
                let Ok(bytes) = body_of(function, image) else {
                    report.unreadable += 1;
                    continue;
                };
                let hash = hash_body(&bytes, function.address, isa);
                if let Some(record) = self.find(hash, function.size) {
                    if !is_placeholder(&record.name) {
                        renames.push((function.address, record.name.clone()));
                    }
                }
                processed += 1;
                progress.tick(processed);
            }
        }

        for (address, name) in renames {
            if db.rename(address, name) {
                report.matched += 1;
            }
        }
        progress.finish(processed);
        report
    }
}

fn read_record(cursor: &mut Cursor<&[u8]>) -> std::io::Result<SignatureRecord> {
    let hash = cursor.read_u64::<BigEndian>()?;
    let size = cursor.read_u32::<BigEndian>()?;
    let name_len = cursor.read_u16::<BigEndian>()?;
    let mut name = vec![0u8; usize::from(name_len)];
    cursor.read_exact(&mut name)?;
    let name = String::from_utf8(name)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(SignatureRecord { hash, size, name })
}
