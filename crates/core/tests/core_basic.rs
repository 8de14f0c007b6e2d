use symscan_core::backends::instruction_set_by_name;
use symscan_core::version;

#[test]
fn version_is_non_empty() {
    let v = version();
    assert!(!v.is_empty());
}

#[test]
fn instruction_sets_are_selected_by_name() {
    for name in ["ppc", "PowerPC", "gekko", "broadway"] {
        let isa = instruction_set_by_name(name).expect("known ISA");
        assert_eq!(isa.name(), "ppc");
        assert_eq!(isa.width(), 4);
    }
    assert!(instruction_set_by_name("z80").is_none());
}
