//! A debug session: one symbol database, one memory image, one configuration.
//!
//! This is the command surface a frontend drives. Every method runs to
//! completion on the calling thread, and the mutating ones take `&mut self`,
//! so two operations can never touch the same database at once. Independent
//! sessions own independent databases.

use std::path::Path;

use crate::analysis::{NoopObserver, ScanObserver, ScanReport, Scanner};
use crate::backends::{instruction_set_by_name, InstructionSet, MemoryImage};
use crate::config::EngineConfig;
use crate::db::{FillReport, SymbolDb};
use crate::error::{Error, Result};
use crate::model::{AddressRange, Symbol};
use crate::services::{mapfile, renames, HashReport, MapLoadReport, RenameReport, SignatureDb};

/// Prefix removed by [`Session::clean_placeholders`].
pub const CLEAN_PREFIX: &str = "zz";

/// Outcome of [`Session::generate_symbol_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateReport {
    pub scan: ScanReport,
    /// Functions named from the default signature library; `None` when no
    /// library is configured or the file does not exist.
    pub named: Option<usize>,
    pub callers: FillReport,
}

/// Which branch [`Session::load_map_or_scan`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    Loaded { map: MapLoadReport, callers: FillReport },
    Scanned(GenerateReport),
}

pub struct Session {
    config: EngineConfig,
    isa: Box<dyn InstructionSet>,
    image: Box<dyn MemoryImage>,
    db: SymbolDb,
}

impl Session {
    /// Create a session over `image`, selecting the instruction set named in `config`.
    pub fn new(image: impl MemoryImage + 'static, config: EngineConfig) -> Result<Self> {
        let isa = instruction_set_by_name(&config.isa).ok_or_else(|| {
            Error::Precondition(format!("unknown instruction set '{}'", config.isa))
        })?;
        Ok(Self::with_isa(image, isa, config))
    }

    pub fn with_isa(
        image: impl MemoryImage + 'static,
        isa: Box<dyn InstructionSet>,
        config: EngineConfig,
    ) -> Self {
        Self { config, isa, image: Box::new(image), db: SymbolDb::new() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn db(&self) -> &SymbolDb {
        &self.db
    }

    pub fn isa(&self) -> &dyn InstructionSet {
        self.isa.as_ref()
    }

    /// Symbols in ascending address order, for display.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.db.iter()
    }

    pub fn lookup(&self, address: u32) -> Option<&Symbol> {
        self.db.lookup(address)
    }

    fn scan_range(
        &mut self,
        range: AddressRange,
        observer: &mut dyn ScanObserver,
    ) -> Result<ScanReport> {
        Scanner::new(self.image.as_ref(), self.isa.as_ref())
            .with_progress_interval(self.config.progress_interval)
            .scan(range, &mut self.db, observer)
    }

    /// Discover functions in `[start, end)`.
    pub fn scan(&mut self, start: u32, end: u32) -> Result<ScanReport> {
        self.scan_with(start, end, &mut NoopObserver)
    }

    /// [`Session::scan`] with progress reporting and cooperative cancellation.
    pub fn scan_with(
        &mut self,
        start: u32,
        end: u32,
        observer: &mut dyn ScanObserver,
    ) -> Result<ScanReport> {
        self.scan_range(AddressRange::new(start, end), observer)
    }

    /// Remove all symbols, or those whose name starts with `prefix`.
    pub fn clear(&mut self, prefix: Option<&str>) -> usize {
        self.db.clear(prefix)
    }

    /// Drop every symbol still carrying a synthesized `zz` name.
    pub fn clean_placeholders(&mut self) -> usize {
        self.db.clear(Some(CLEAN_PREFIX))
    }

    pub fn signature_load(&self, path: &Path) -> Result<SignatureDb> {
        SignatureDb::load(path)
    }

    /// Name placeholder functions from `signatures`. Returns the match count.
    pub fn signature_apply(&mut self, signatures: &SignatureDb) -> usize {
        self.signature_apply_with(signatures, &mut NoopObserver).matched
    }

    pub fn signature_apply_with(
        &mut self,
        signatures: &SignatureDb,
        observer: &mut dyn ScanObserver,
    ) -> HashReport {
        signatures.apply_with(
            &mut self.db,
            self.image.as_ref(),
            self.isa.as_ref(),
            observer,
            self.config.progress_interval,
        )
    }

    /// Build a signature library from this session's functions.
    pub fn signature_initialize(&self, prefix: Option<&str>) -> SignatureDb {
        self.signature_initialize_with(prefix, &mut NoopObserver).0
    }

    pub fn signature_initialize_with(
        &self,
        prefix: Option<&str>,
        observer: &mut dyn ScanObserver,
    ) -> (SignatureDb, HashReport) {
        SignatureDb::initialize_with(
            &self.db,
            self.image.as_ref(),
            self.isa.as_ref(),
            prefix.unwrap_or(""),
            observer,
            self.config.progress_interval,
        )
    }

    pub fn signature_save(&self, signatures: &SignatureDb, path: &Path) -> Result<()> {
        signatures.save(path)
    }

    /// Read a map file and size its bodiless functions against the image.
    ///
    /// Each such function is walked to its terminating return, capped at the
    /// distance to the next symbol. When the walk fails the inferred size stays.
    fn read_map(&self, path: &Path) -> Result<(SymbolDb, MapLoadReport)> {
        let (mut db, mut report) = mapfile::load(path)?;
        let scanner = Scanner::new(self.image.as_ref(), self.isa.as_ref());
        let pending: Vec<(u32, Option<u32>)> = db
            .functions()
            .filter(|f| f.body.is_none())
            .map(|f| (f.address, (f.size > 0).then_some(f.size)))
            .collect();
        for (address, limit) in pending {
            let Some(size) = scanner.measure(address, limit) else {
                continue;
            };
            if let Some(function) = db.get_mut(address) {
                function.size = size;
                report.measured += 1;
            }
        }
        Ok((db, report))
    }

    /// Replace the database with the contents of a map file, then rebuild
    /// cross-references. On error the current database is left untouched.
    pub fn map_load(&mut self, path: &Path) -> Result<MapLoadReport> {
        let (db, report) = self.read_map(path)?;
        self.db = db;
        self.fill_callers();
        Ok(report)
    }

    pub fn map_save(&self, path: &Path, with_body: bool) -> Result<()> {
        mapfile::save(&self.db, path, with_body, Some(self.image.as_ref()))
    }

    pub fn fill_callers(&mut self) -> FillReport {
        self.db.fill_callers(self.image.as_ref(), self.isa.as_ref())
    }

    pub fn apply_renames(&mut self, path: &Path) -> Result<RenameReport> {
        renames::apply_renames(path, &mut self.db)
    }

    /// Apply the configured default signature library.
    ///
    /// `Ok(None)` when none is configured or the file is absent; a file that
    /// exists but cannot be parsed is an error.
    pub fn apply_default_signatures(&mut self) -> Result<Option<usize>> {
        let Some(path) = self.config.signature_db.clone() else {
            return Ok(None);
        };
        match SignatureDb::load(&path) {
            Ok(signatures) => Ok(Some(self.signature_apply(&signatures))),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Scan the configured generate range, name what the default signature
    /// library recognises, and rebuild cross-references.
    pub fn generate_symbol_map(&mut self) -> Result<GenerateReport> {
        let range = self.config.generate_range;
        self.scan_and_name(range, &mut NoopObserver)
    }

    fn scan_and_name(
        &mut self,
        range: AddressRange,
        observer: &mut dyn ScanObserver,
    ) -> Result<GenerateReport> {
        let scan = self.scan_range(range, observer)?;
        let named = self.apply_default_signatures()?;
        let callers = self.fill_callers();
        Ok(GenerateReport { scan, named, callers })
    }

    /// Load `path`; when it does not exist, clear the database and scan the
    /// configured fallback range instead.
    pub fn load_map_or_scan(&mut self, path: &Path) -> Result<MapOutcome> {
        self.load_map_or_scan_with(path, &mut NoopObserver)
    }

    pub fn load_map_or_scan_with(
        &mut self,
        path: &Path,
        observer: &mut dyn ScanObserver,
    ) -> Result<MapOutcome> {
        match self.read_map(path) {
            Ok((db, map)) => {
                self.db = db;
                let callers = self.fill_callers();
                Ok(MapOutcome::Loaded { map, callers })
            }
            Err(Error::NotFound(_)) => {
                self.db.clear(None);
                let range = self.config.fallback_range;
                Ok(MapOutcome::Scanned(self.scan_and_name(range, observer)?))
            }
            Err(e) => Err(e),
        }
    }
}
