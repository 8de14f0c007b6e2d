// crates/core/tests/scanner.rs

mod common;

use std::cell::Cell;

use common::*;
use symscan_core::analysis::{FnObserver, NoopObserver, Scanner};
use symscan_core::db::SymbolDb;
use symscan_core::model::{AddressRange, Symbol};
use symscan_core::Error;

fn scan(
    image: &symscan_core::backends::FlatImage,
    start: u32,
    end: u32,
    db: &mut SymbolDb,
) -> symscan_core::Result<symscan_core::analysis::ScanReport> {
    Scanner::new(image, &PowerPc).scan(AddressRange::new(start, end), db, &mut NoopObserver)
}

#[test]
fn single_return_yields_one_function_ending_after_it() {
    let base = 0x8000_1000;
    let image = image_from_words(base, &[LI_R3_0, ADDI_R4, LI_R3_1, RET]);
    let mut db = SymbolDb::new();

    let report = scan(&image, base, base + 16, &mut db).expect("scan");

    assert_eq!(report.functions, 1);
    assert_eq!(db.len(), 1);
    let sym = db.lookup(base).expect("function at range start");
    assert_eq!(sym.size, 12 + 4, "size is offset of the return plus one instruction");
    assert_eq!(sym.name, "zz_80001000");
    assert!(sym.is_function());
}

#[test]
fn trailing_run_without_return_is_not_a_function() {
    let base = 0x1000;
    let image = image_from_words(base, &[LI_R3_0, RET, LI_R3_1, ADDI_R4]);
    let mut db = SymbolDb::new();

    let report = scan(&image, base, base + 16, &mut db).expect("scan");

    assert_eq!(report.functions, 1);
    assert!(report.unterminated);
    assert_eq!(db.len(), 1);
    assert_eq!(db.lookup(base).map(|s| s.size), Some(8));
}

#[test]
fn padding_between_functions_is_a_gap() {
    let base = 0x0;
    let words = [PAD, PAD, LI_R3_0, RET, PAD, 0, LI_R3_0, LI_R3_1, RET];
    let image = image_from_words(base, &words);
    let mut db = SymbolDb::new();

    let report = scan(&image, base, at(base, words.len() as u32), &mut db).expect("scan");

    assert_eq!(report.functions, 2);
    assert_eq!(report.gaps, 2);
    let found: Vec<(u32, u32)> = db.iter().map(|s| (s.address, s.size)).collect();
    assert_eq!(found, vec![(0x8, 8), (0x18, 12)]);
}

#[test]
fn forward_conditional_branch_extends_past_early_return() {
    let base = 0x100;
    let words = [
        PowerPc::encode_bne(at(base, 0), at(base, 3)),
        RET, // early return, branch above still targets past it
        LI_R3_0,
        RET,
    ];
    let image = image_from_words(base, &words);
    let mut db = SymbolDb::new();

    let report = scan(&image, base, at(base, 4), &mut db).expect("scan");

    assert_eq!(report.functions, 1);
    assert_eq!(db.lookup(base).map(|s| s.size), Some(16));
}

#[test]
fn calls_outside_range_are_recorded_but_not_expanded() {
    let base = 0x2000;
    let words = [PowerPc::encode_bl(at(base, 0), 0x9000), RET];
    let image = image_from_words(base, &words);
    let mut db = SymbolDb::new();

    let report = scan(&image, base, at(base, 2), &mut db).expect("scan");

    assert_eq!(report.external_calls, 1);
    assert_eq!(db.len(), 1);
    let sym = db.lookup(base).expect("function");
    assert_eq!(sym.callees.iter().copied().collect::<Vec<_>>(), vec![0x9000]);
    assert!(db.lookup(0x9000).is_none());
}

#[test]
fn rejects_empty_and_misaligned_ranges_before_doing_work() {
    let image = image_from_words(0, &[LI_R3_0, RET]);
    let mut db = SymbolDb::new();

    assert!(matches!(scan(&image, 8, 8, &mut db), Err(Error::Precondition(_))));
    assert!(matches!(scan(&image, 8, 4, &mut db), Err(Error::Precondition(_))));
    assert!(matches!(scan(&image, 2, 8, &mut db), Err(Error::Precondition(_))));
    assert!(db.is_empty());
}

#[test]
fn unmapped_range_fails_without_partial_results() {
    let image = image_from_words(0x1000, &[LI_R3_0, RET]);
    let mut db = SymbolDb::new();

    let err = scan(&image, 0x1000, 0x1010, &mut db).unwrap_err();

    assert!(matches!(err, Error::Unmapped { address: 0x1000, length: 0x10 }));
    assert!(db.is_empty());
}

#[test]
fn entries_outside_the_range_are_untouched() {
    let base = 0x4000;
    let image = image_from_words(base, &[LI_R3_0, RET]);
    let mut db = SymbolDb::new();
    db.insert(Symbol::function(0x100, 8).with_name("outside"));
    db.insert(Symbol::data(0x9000, 4, "gTable"));

    scan(&image, base, at(base, 2), &mut db).expect("scan");

    assert_eq!(db.len(), 3);
    assert_eq!(db.lookup(0x100).map(|s| s.name.as_str()), Some("outside"));
    assert_eq!(db.lookup(0x9000).map(|s| s.name.as_str()), Some("gTable"));
}

#[test]
fn function_straddling_the_range_start_is_shortened_not_evicted() {
    let base = 0x8000_0000;
    let words = [
        LI_R3_0, LI_R3_1, ADDI_R4, RET, PAD, PAD, PAD, PAD, // OSInit
        LI_R3_0, RET, PAD, PAD, // rescanned
        LI_R3_1, RET, // GXEnd
    ];
    let image = image_from_words(base, &words);
    let mut db = SymbolDb::new();
    // Sizes as inferred from a plain map: each runs up to the next symbol.
    db.insert(Symbol::function(base, 0x30).with_name("OSInit"));
    db.insert(Symbol::function(at(base, 12), 8).with_name("GXEnd"));

    let report = scan(&image, at(base, 8), at(base, 12), &mut db).expect("scan");

    assert_eq!(report.functions, 1);
    assert_eq!(report.truncated, 1);
    let entries: Vec<(u32, u32, &str)> =
        db.iter().map(|s| (s.address, s.size, s.name.as_str())).collect();
    assert_eq!(
        entries,
        vec![
            (base, 0x20, "OSInit"),
            (at(base, 8), 8, "zz_80000020"),
            (at(base, 12), 8, "GXEnd"),
        ]
    );
}

#[test]
fn straddling_function_that_ends_before_new_functions_is_left_alone() {
    let base = 0x1000;
    let words = [LI_R3_0, RET, PAD, PAD, PAD, LI_R3_0, RET];
    let image = image_from_words(base, &words);
    let mut db = SymbolDb::new();
    db.insert(Symbol::function(base, 16).with_name("head"));

    let report = scan(&image, at(base, 2), at(base, 7), &mut db).expect("scan");

    assert_eq!(report.functions, 1);
    assert_eq!(report.truncated, 0);
    assert_eq!(db.lookup(base).map(|s| (s.size, s.name.as_str())), Some((16, "head")));
}

#[test]
fn zero_words_count_as_padding() {
    let base = 0x2000;
    let image = image_from_words(base, &[0, 0, 0, LI_R3_0, RET]);
    let mut db = SymbolDb::new();

    let report = scan(&image, base, at(base, 5), &mut db).expect("scan");

    assert_eq!(report.gaps, 1);
    assert_eq!(db.lookup(at(base, 3)).map(|s| s.size), Some(8));
    assert!(db.lookup(base).is_none());
}

#[test]
fn measure_walks_to_the_terminating_return() {
    let base = 0x3000;
    let words = [
        PowerPc::encode_bne(at(base, 0), at(base, 3)),
        RET,
        LI_R3_0,
        LI_R3_1,
        RET,
        PAD,
        LI_R3_0,
    ];
    let image = image_from_words(base, &words);
    let scanner = Scanner::new(&image, &PowerPc);

    assert_eq!(scanner.measure(base, None), Some(20));
    assert_eq!(scanner.measure(base, Some(24)), Some(20));
    assert_eq!(scanner.measure(at(base, 2), Some(8)), None, "return lies past the limit");
    assert_eq!(scanner.measure(at(base, 6), None), None, "runs off the image");
}

#[test]
fn rescanning_keeps_resolved_names() {
    let base = 0x4000;
    let image = image_from_words(base, &[LI_R3_0, RET, LI_R3_1, RET]);
    let mut db = SymbolDb::new();
    scan(&image, base, at(base, 4), &mut db).expect("first scan");
    assert!(db.rename(base, "OSInit"));

    let report = scan(&image, base, at(base, 4), &mut db).expect("second scan");

    assert_eq!(report.functions, 2);
    assert_eq!(db.lookup(base).map(|s| s.name.as_str()), Some("OSInit"));
    assert_eq!(db.lookup(at(base, 2)).map(|s| s.name.as_str()), Some("zz_00004008"));
}

#[test]
fn cancellation_keeps_functions_found_so_far() {
    let base = 0x0;
    let words = [LI_R3_0, RET, LI_R3_0, RET, LI_R3_0, RET, LI_R3_0, RET];
    let image = image_from_words(base, &words);
    let mut db = SymbolDb::new();
    let found = Cell::new(0usize);
    let mut observer = FnObserver { progress: |n| found.set(n), cancel: || found.get() >= 2 };

    let report = Scanner::new(&image, &PowerPc)
        .with_progress_interval(1)
        .scan(AddressRange::new(base, at(base, 8)), &mut db, &mut observer)
        .expect("scan");

    assert!(report.cancelled);
    assert_eq!(report.functions, 2);
    let addresses: Vec<u32> = db.iter().map(|s| s.address).collect();
    assert_eq!(addresses, vec![0x0, 0x8]);
}

#[test]
fn progress_is_reported_monotonically_and_at_the_end() {
    let words: Vec<u32> = (0..10).flat_map(|_| [LI_R3_0, RET]).collect();
    let image = image_from_words(0, &words);
    let mut db = SymbolDb::new();
    let mut seen = Vec::new();

    {
        let mut observer = FnObserver { progress: |n| seen.push(n), cancel: || false };
        Scanner::new(&image, &PowerPc)
            .with_progress_interval(3)
            .scan(AddressRange::new(0, at(0, 20)), &mut db, &mut observer)
            .expect("scan");
    }

    assert_eq!(seen, vec![3, 6, 9, 10]);
}
