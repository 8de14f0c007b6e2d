// crates/core/tests/session.rs

mod common;

use std::fs;
use std::path::Path;

use common::*;
use symscan_core::backends::FlatImage;
use symscan_core::config::{load_config, EngineConfig};
use symscan_core::model::{AddressRange, Symbol};
use symscan_core::services::SignatureDb;
use symscan_core::session::{MapOutcome, Session};
use symscan_core::Error;
use tempfile::tempdir;

const BASE: u32 = 0x8130_0000;
const FUNCTIONS: u32 = 16;

/// `FUNCTIONS` copies of a 16-byte function starting at `BASE`.
fn repeated_image() -> FlatImage {
    let words: Vec<u32> =
        (0..FUNCTIONS).flat_map(|_| [LI_R3_0, LI_R3_1, ADDI_R4, RET]).collect();
    image_from_words(BASE, &words)
}

fn config() -> EngineConfig {
    let range = AddressRange::new(BASE, BASE + FUNCTIONS * 16);
    EngineConfig { generate_range: range, fallback_range: range, ..EngineConfig::default() }
}

fn session() -> Session {
    Session::new(repeated_image(), config()).expect("session")
}

fn names(session: &Session) -> Vec<String> {
    session.symbols().map(|s| s.name.clone()).collect()
}

#[test]
fn unknown_instruction_set_is_rejected() {
    let config = EngineConfig { isa: "z80".into(), ..EngineConfig::default() };
    let err = Session::new(repeated_image(), config).err().expect("should fail");
    assert!(matches!(err, Error::Precondition(_)));
}

#[test]
fn missing_map_falls_back_to_scanning() {
    let temp = tempdir().expect("temp dir");
    let mut session = session();
    session.scan(BASE, BASE + 16).expect("seed scan");
    session.clear(None);

    let missing = temp.path().join("GALE01.map");
    assert!(session.map_load(&missing).unwrap_err().is_not_found());

    let outcome = session.load_map_or_scan(&missing).expect("fallback");

    let report = match outcome {
        MapOutcome::Scanned(report) => report,
        other => panic!("expected a scan, got {other:?}"),
    };
    assert_eq!(report.scan.functions, FUNCTIONS as usize);
    assert_eq!(report.named, None);
    let expected: Vec<String> =
        (0..FUNCTIONS).map(|i| format!("zz_{:08x}", BASE + i * 16)).collect();
    assert_eq!(names(&session), expected);
    assert_eq!(session.signature_apply(&SignatureDb::new()), 0);
}

#[test]
fn existing_map_is_loaded_instead_of_scanning() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("GALE01.map");
    fs::write(&path, "81300000 00 first\n81300010 00 second\n").expect("write map");
    let mut session = session();
    session.scan(BASE, BASE + FUNCTIONS * 16).expect("scan");

    let outcome = session.load_map_or_scan(&path).expect("load");

    assert!(matches!(outcome, MapOutcome::Loaded { .. }));
    assert_eq!(names(&session), vec!["first", "second"]);
}

#[test]
fn damaged_map_is_an_error_and_keeps_the_database() {
    let temp = tempdir().expect("temp dir");
    let mut session = session();
    session.scan(BASE, BASE + 32).expect("scan");

    // A directory where a file is expected cannot be read.
    let err = session.load_map_or_scan(temp.path()).unwrap_err();

    assert!(!err.is_not_found());
    assert_eq!(session.db().len(), 2);
}

#[test]
fn clean_placeholders_keeps_resolved_names() {
    let mut session = session();
    session.scan(BASE, BASE + 48).expect("scan");
    let temp = tempdir().expect("temp dir");
    let renames = temp.path().join("renames.txt");
    fs::write(&renames, "81300010 00 OSInit\n").expect("write renames");
    assert_eq!(session.apply_renames(&renames).expect("renames").applied, 1);

    assert_eq!(session.clean_placeholders(), 2);
    assert_eq!(names(&session), vec!["OSInit"]);
}

#[test]
fn generate_applies_the_configured_signature_library() {
    let temp = tempdir().expect("temp dir");
    let sig_path = temp.path().join("totaldb.dsy");

    // Build the library from a session where the function is already named.
    let mut donor = session();
    donor.scan(BASE, BASE + 16).expect("scan");
    let renames = temp.path().join("renames.txt");
    fs::write(&renames, "81300000 00 GXSetup\n").expect("write renames");
    donor.apply_renames(&renames).expect("renames");
    let library = donor.signature_initialize(Some("GX"));
    assert_eq!(library.len(), 1);
    donor.signature_save(&library, &sig_path).expect("save signatures");

    let config = config().with_signature_db(Some(sig_path.clone()));
    let mut session = Session::new(repeated_image(), config).expect("session");
    let report = session.generate_symbol_map().expect("generate");

    assert_eq!(report.scan.functions, FUNCTIONS as usize);
    assert_eq!(report.named, Some(FUNCTIONS as usize));
    assert!(session.symbols().all(|s| s.name == "GXSetup"));
    assert_eq!(session.signature_load(&sig_path).expect("load"), library);
}

#[test]
fn generate_without_a_library_file_still_succeeds() {
    let temp = tempdir().expect("temp dir");
    let config = config().with_signature_db(Some(temp.path().join("absent.dsy")));
    let mut session = Session::new(repeated_image(), config).expect("session");

    let report = session.generate_symbol_map().expect("generate");

    assert_eq!(report.named, None);
    assert_eq!(session.db().len(), FUNCTIONS as usize);
}

#[test]
fn map_round_trip_through_a_session_rebuilds_callers() {
    let base = 0x8000_0000;
    let words = [PowerPc::encode_bl(base, base + 8), RET, LI_R3_0, RET];
    let image = image_from_words(base, &words);
    let config = EngineConfig {
        generate_range: AddressRange::new(base, base + 16),
        ..EngineConfig::default()
    };
    let mut session = Session::new(image, config.clone()).expect("session");
    session.generate_symbol_map().expect("generate");
    assert_eq!(session.lookup(base + 8).map(|s| s.callers.len()), Some(1));

    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("out.map");
    session.map_save(&path, true).expect("save");

    let mut reloaded = Session::new(FlatImage::default(), config).expect("session");
    let report = reloaded.map_load(&path).expect("load");

    assert_eq!(report.with_body, 2);
    let callee = reloaded.lookup(base + 8).expect("callee");
    assert_eq!(callee.callers.iter().copied().collect::<Vec<_>>(), vec![base]);
}

/// `OSMain` at 0x80000000 calls `OSHelper` at 0x80000010, which calls back.
/// Each is 12 bytes followed by one `nop`.
fn calling_pair_image() -> FlatImage {
    let base = 0x8000_0000;
    let words = [
        PowerPc::encode_bl(base, base + 16),
        LI_R3_0,
        RET,
        PAD,
        PowerPc::encode_bl(base + 16, base),
        ADDI_R4,
        RET,
        PAD,
    ];
    image_from_words(base, &words)
}

const PLAIN_PAIR_MAP: &str = "80000000 00 OSMain\n80000010 00 OSHelper\n";

fn sizes(session: &Session) -> Vec<u32> {
    session.symbols().map(|s| s.size).collect()
}

#[test]
fn plain_map_functions_are_sized_from_the_image() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("plain.map");
    fs::write(&path, PLAIN_PAIR_MAP).expect("write map");

    let mut session =
        Session::new(calling_pair_image(), EngineConfig::default()).expect("session");
    let report = session.map_load(&path).expect("load");

    assert_eq!(report.measured, 2);
    assert_eq!(sizes(&session), vec![12, 12]);
    let main = session.lookup(0x8000_0000).expect("OSMain");
    assert_eq!(main.callers.iter().copied().collect::<Vec<_>>(), vec![0x8000_0010]);
    let helper = session.lookup(0x8000_0010).expect("OSHelper");
    assert_eq!(helper.callers.iter().copied().collect::<Vec<_>>(), vec![0x8000_0000]);
}

#[test]
fn plain_map_sizes_fall_back_to_the_next_symbol_without_an_image() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("plain.map");
    fs::write(&path, PLAIN_PAIR_MAP).expect("write map");

    let mut session =
        Session::new(FlatImage::default(), EngineConfig::default()).expect("session");
    let report = session.map_load(&path).expect("load");

    assert_eq!(report.measured, 0);
    assert_eq!(sizes(&session), vec![16, 0]);
}

#[test]
fn library_built_from_a_plain_map_names_a_fresh_scan() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("plain.map");
    fs::write(&path, PLAIN_PAIR_MAP).expect("write map");

    let mut named = Session::new(calling_pair_image(), EngineConfig::default()).expect("session");
    named.map_load(&path).expect("load");
    let library = named.signature_initialize(None);
    assert!(library.records().iter().all(|r| r.size == 12));

    let mut fresh = Session::new(calling_pair_image(), EngineConfig::default()).expect("session");
    fresh.scan(0x8000_0000, 0x8000_0020).expect("scan");

    assert_eq!(fresh.signature_apply(&library), 2);
    assert_eq!(names(&fresh), vec!["OSMain", "OSHelper"]);
}

#[test]
fn scanning_a_sub_range_after_a_plain_load_keeps_earlier_functions() {
    let base = 0x8000_0000;
    let words = [
        LI_R3_0, LI_R3_1, ADDI_R4, RET, PAD, PAD, PAD, PAD, // OSInit
        LI_R3_0, RET, PAD, PAD, // scanned
        LI_R3_1, RET, // GXEnd
    ];
    let image = image_from_words(base, &words);
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("plain.map");
    fs::write(&path, "80000000 00 OSInit\n80000030 00 GXEnd\n").expect("write map");

    let mut session = Session::new(image, EngineConfig::default()).expect("session");
    session.map_load(&path).expect("load");
    let report = session.scan(base + 0x20, base + 0x30).expect("scan");

    assert_eq!(report.functions, 1);
    assert_eq!(names(&session), vec!["OSInit", "zz_80000020", "GXEnd"]);
}

#[test]
fn config_file_round_trips_through_json() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("symscan.json");
    let config = config().with_signature_db(Some(Path::new("totaldb.dsy").to_path_buf()));
    fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize")).expect("write");

    assert_eq!(load_config(&path).expect("load"), config);

    fs::write(&path, "{ not json").expect("write");
    assert!(matches!(load_config(&path), Err(Error::Config { .. })));
}

#[test]
fn inserted_symbols_are_visible_through_lookup() {
    let mut session = session();
    session.scan(BASE, BASE + 16).expect("scan");
    let sym: &Symbol = session.lookup(BASE).expect("function");
    assert_eq!(sym.size, 16);
    assert!(session.lookup(BASE + 4).is_none());
}
