//! Whole-pipeline behavior: lowering, determinism, lint policy and the
//! failures that must surface before any text is produced.

use kiln_conformance::{codes, emit, emit_with, make_config, make_config_with_lint};
use kiln_config::KilnConfig;
use kiln_elaborate::{Fsm, Module};
use kiln_ir::{
    ClockDomain, DifferentialInput, ElabError, ElabResult, Fragment, MultiReg, Signal, Special,
    SpecialTag, Statement, ValueOps,
};
use kiln_lower::{Lowering, SpecialLowerer, SpecialOverrides};
use kiln_verilog::convert;

fn synchronizer() -> (Special, Signal, Signal) {
    let din = Signal::new("din", 2);
    let dout = Signal::new("dout", 2);
    let special = Special::from(MultiReg {
        input: din.clone().into(),
        output: dout.clone(),
        odomain: "sys".into(),
        stages: 3,
    });
    (special, din, dout)
}

// ============================================================================
// Lowering
// ============================================================================

#[test]
fn lowering_twice_matches_lowering_once() {
    let (special, _, _) = synchronizer();
    let overrides = SpecialOverrides::generic();
    let mut lowerer = SpecialLowerer::new(&overrides);
    let once = lowerer.lower_special(&special).unwrap();
    let twice = lowerer.lower_special(&special).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.sync["sys"].len(), 3);
}

#[test]
fn special_shared_by_two_fragments_lowers_once() {
    let (special, _, dout) = synchronizer();
    let mut a = Fragment::new();
    a.add_special(special.clone());
    let mut b = Fragment::new();
    b.add_special(special);
    let overrides = SpecialOverrides::generic();
    let lowered = SpecialLowerer::new(&overrides).lower_fragment(a + b).unwrap();
    assert_eq!(lowered.sync["sys"].len(), 3);
    assert_eq!(lowered.comb, vec![dout.clone().assign(&lowered_tail(&lowered))]);
    lowered.check_drivers().unwrap();
}

fn lowered_tail(f: &Fragment) -> Signal {
    match f.sync["sys"].last() {
        Some(Statement::Assign { lhs, .. }) => lhs.as_signal().cloned().unwrap(),
        other => panic!("unexpected tail {other:?}"),
    }
}

#[derive(Debug)]
struct Forgetful;

impl Lowering for Forgetful {
    fn name(&self) -> &str {
        "forgetful"
    }

    fn lower(&self, _special: &Special) -> ElabResult<Fragment> {
        Ok(Fragment::new())
    }
}

#[test]
fn lowering_that_drops_an_output_is_rejected() {
    let (special, din, dout) = synchronizer();
    let mut m = Module::new("top");
    m.add_special(special);
    let overrides = SpecialOverrides::new().with(SpecialTag::MultiReg, Forgetful);
    let err = convert(m, &[din, dout], &overrides, &KilnConfig::default()).unwrap_err();
    assert!(matches!(err, ElabError::LoweringLostPort { .. }), "{err:?}");
}

#[test]
fn abstract_special_without_lowering_fails() {
    let (special, din, dout) = synchronizer();
    let mut m = Module::new("top");
    m.add_special(special);
    let err = convert(m, &[din, dout], &SpecialOverrides::new(), &KilnConfig::default())
        .unwrap_err();
    assert!(matches!(err, ElabError::MissingLowering { ref special } if special.contains("MultiReg")));
}

#[test]
fn vendor_table_buffers_differential_pairs() {
    let p = Signal::new("clk_p", 1);
    let n = Signal::new("clk_n", 1);
    let o = Signal::new("clk", 1);
    let mut m = Module::new("top");
    m.add_special(DifferentialInput {
        p: p.clone(),
        n: n.clone(),
        output: o.clone(),
    });
    let err = emit(m, &[p.clone(), n.clone(), o.clone()]).unwrap_err();
    assert!(matches!(err, ElabError::MissingLowering { .. }));

    let mut m = Module::new("top");
    m.add_special(DifferentialInput {
        p: p.clone(),
        n: n.clone(),
        output: o.clone(),
    });
    let out = convert(
        m,
        &[p, n, o],
        &SpecialOverrides::vendor_primitives(),
        &KilnConfig::default(),
    )
    .unwrap();
    assert!(out.source.contains("IBUFDS"));
    assert_eq!(out.port_names(), vec!["clk_p", "clk_n", "clk"]);
}

// ============================================================================
// Determinism
// ============================================================================

fn design() -> (Module, Vec<Signal>) {
    let go = Signal::new("go", 1);
    let led = Signal::new("led", 1);
    let mut fsm = Fsm::new("ctl");
    fsm.act(
        "IDLE",
        [kiln_ir::If::new(&go, [Statement::next_state("ON")]).into()],
    );
    fsm.act("ON", [led.clone().assign(1), Statement::next_state("IDLE")]);
    let mut top = Module::new("top");
    top.add_clock_domain(ClockDomain::new("sys"));
    top.add_submodule(Some("fsm"), fsm).unwrap();
    (top, vec![go, led])
}

#[test]
fn identical_designs_emit_identical_text() {
    let (a, ios_a) = design();
    let (b, ios_b) = design();
    let out_a = emit(a, &ios_a).unwrap();
    let out_b = emit(b, &ios_b).unwrap();
    assert_eq!(out_a.source, out_b.source);
    assert_eq!(out_a.hash, out_b.hash);
}

#[test]
fn module_name_comes_from_config() {
    let (m, ios) = design();
    let out = emit_with(m, &ios, &make_config("blinky")).unwrap();
    assert_eq!(out.module_name, "blinky");
    assert!(out.source.contains("module blinky("));
}

// ============================================================================
// Lint policy
// ============================================================================

fn implicit_domain() -> (Module, Signal) {
    let r = Signal::new("r", 3);
    let mut m = Module::new("top");
    m.add_sync("sys", [r.clone().assign(&r + 1)]);
    (m, r)
}

#[test]
fn warnings_pass_through_by_default() {
    let (m, r) = implicit_domain();
    let out = emit(m, &[r]).unwrap();
    assert_eq!(codes(&out.diagnostics), vec!["W300"]);
}

#[test]
fn allowed_warnings_are_dropped() {
    let (m, r) = implicit_domain();
    let out = emit_with(m, &[r], &make_config_with_lint("top", &[], &["W300"])).unwrap();
    assert!(out.diagnostics.is_empty());
}

#[test]
fn denied_warnings_fail_conversion() {
    let (m, r) = implicit_domain();
    let err = emit_with(m, &[r], &make_config_with_lint("top", &["W300"], &[])).unwrap_err();
    assert!(matches!(err, ElabError::DeniedWarning { .. }));
}

#[test]
fn one_bad_code_does_not_void_the_valid_deny() {
    let (m, r) = implicit_domain();
    let mut config = make_config("top");
    config.lint.deny = vec!["W300".into(), "bogus".into()];
    let err = emit_with(m, &[r], &config).unwrap_err();
    assert!(matches!(err, ElabError::InvalidLintConfig { .. }), "{err:?}");
    assert_eq!(err.code().to_string(), "E220");
}

#[test]
fn truncating_assignment_warns() {
    let a = Signal::new("a", 8);
    let b = Signal::new("b", 4);
    let mut m = Module::new("top");
    m.add_comb([b.clone().assign(&a)]);
    let out = emit(m, &[a, b]).unwrap();
    assert_eq!(codes(&out.diagnostics), vec!["W304"]);
}

#[test]
fn unreachable_state_warns() {
    let mut fsm = Fsm::new("f");
    fsm.act("A", [Statement::next_state("A")]);
    fsm.act("ORPHAN", Vec::<Statement>::new());
    let mut top = Module::new("top");
    top.add_clock_domain(ClockDomain::new("sys"));
    top.add_submodule(Some("f"), fsm).unwrap();
    let out = emit(top, &[]).unwrap();
    assert!(codes(&out.diagnostics).contains(&"W302".to_string()));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn register_driven_from_two_domains_fails() {
    let r = Signal::new("r", 1);
    let mut m = Module::new("top");
    m.add_sync("a", [r.clone().assign(1)]);
    m.add_sync("b", [r.clone().assign(0)]);
    let err = emit(m, &[r]).unwrap_err();
    assert!(matches!(err, ElabError::DriverConflict { ref signal, .. } if signal == "r"));
}

#[test]
fn comb_and_sync_driver_fails() {
    let r = Signal::new("r", 1);
    let mut m = Module::new("top");
    m.add_comb([r.clone().assign(1)]);
    m.add_sync("sys", [r.clone().assign(0)]);
    assert!(matches!(emit(m, &[r]).unwrap_err(), ElabError::DriverConflict { .. }));
}

#[test]
fn finalizing_twice_fails() {
    let mut m = Module::new("top");
    m.finalize().unwrap();
    assert_eq!(
        m.finalize().unwrap_err(),
        ElabError::AlreadyFinalized {
            module: "top".into()
        }
    );
}

#[test]
fn next_state_outside_fsm_fails() {
    let mut m = Module::new("top");
    m.add_comb([Statement::next_state("RUN")]);
    assert!(matches!(
        emit(m, &[]).unwrap_err(),
        ElabError::UnloweredFsmStatement { .. }
    ));
}

#[test]
fn unknown_fsm_target_fails() {
    let mut fsm = Fsm::new("f");
    fsm.act("A", [Statement::next_state("NOWHERE")]);
    let err = emit(Module::from(fsm), &[]).unwrap_err();
    assert_eq!(
        err,
        ElabError::UnknownFsmState {
            fsm: "f".into(),
            state: "NOWHERE".into()
        }
    );
}
