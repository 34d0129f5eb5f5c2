//! Conformance test helpers for the kiln compiler.
//!
//! Provides shared pipeline functions that take a module tree through
//! elaboration, lowering, conversion and simulation, returning structured
//! results for assertion in integration tests.

#![warn(missing_docs)]

use kiln_config::{ElaborateConfig, KilnConfig};
use kiln_diagnostics::Diagnostic;
use kiln_elaborate::{ElaborationContext, IntoFragment};
use kiln_ir::{ElabResult, Fragment, Signal};
use kiln_lower::{SpecialLowerer, SpecialOverrides};
use kiln_sim::{SimError, Simulator};
use kiln_verilog::ConvertOutput;

/// Result of elaborating and lowering a design.
pub struct Elaborated {
    /// The flat, lowered fragment.
    pub fragment: Fragment,
    /// Warnings emitted while elaborating.
    pub diagnostics: Vec<Diagnostic>,
}

/// Creates a configuration with the given module name.
pub fn make_config(name: &str) -> KilnConfig {
    let toml_str = format!(
        r#"
[codegen]
name = "{name}"
"#
    );
    kiln_config::load_config_from_str(&toml_str).unwrap()
}

/// Creates a configuration with lint deny/allow overrides.
pub fn make_config_with_lint(name: &str, deny: &[&str], allow: &[&str]) -> KilnConfig {
    let deny_list: Vec<String> = deny.iter().map(|s| format!("\"{s}\"")).collect();
    let allow_list: Vec<String> = allow.iter().map(|s| format!("\"{s}\"")).collect();
    let toml_str = format!(
        r#"
[codegen]
name = "{name}"

[lint]
deny = [{deny}]
allow = [{allow}]
"#,
        deny = deny_list.join(", "),
        allow = allow_list.join(", "),
    );
    kiln_config::load_config_from_str(&toml_str).unwrap()
}

/// Elaborates `top` with default settings and lowers it with the generic
/// lowering table.
pub fn elaborate(top: impl IntoFragment) -> ElabResult<Elaborated> {
    let mut ctx = ElaborationContext::new(&ElaborateConfig::default());
    let fragment = top.into_fragment(&mut ctx)?;
    let overrides = SpecialOverrides::generic();
    let fragment = SpecialLowerer::new(&overrides).lower_fragment(fragment)?;
    Ok(Elaborated {
        fragment,
        diagnostics: ctx.sink.take_all(),
    })
}

/// Elaborates, lowers and loads `top` into a simulator.
pub fn simulate(top: impl IntoFragment) -> Result<Simulator, SimError> {
    let elaborated = elaborate(top)?;
    Simulator::new(&elaborated.fragment)
}

/// Converts `top` with the generic lowering table and default settings.
pub fn emit(top: impl IntoFragment, ios: &[Signal]) -> ElabResult<ConvertOutput> {
    emit_with(top, ios, &KilnConfig::default())
}

/// Converts `top` with the generic lowering table and `config`.
pub fn emit_with(
    top: impl IntoFragment,
    ios: &[Signal],
    config: &KilnConfig,
) -> ElabResult<ConvertOutput> {
    kiln_verilog::convert(top, ios, &SpecialOverrides::generic(), config)
}

/// The codes of `diagnostics`, rendered as strings such as `W301`.
pub fn codes(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(|d| d.code.to_string()).collect()
}
