//! The conversion pipeline from a design to Verilog text.
//!
//! [`convert`] runs every stage in a fixed order: elaboration, the check
//! for FSM statements left outside an FSM, special lowering, value checks,
//! implicit clock domain creation, resolution of clock and reset references,
//! driver checking, port inference, warnings, and finally emission. Every stage
//! either succeeds or aborts the whole conversion with an [`ElabError`].

use crate::emit::emit_module;
use crate::output::{ConvertOutput, Port};
use kiln_config::KilnConfig;
use kiln_diagnostics::{Diagnostic, LintPolicy, Origin};
use kiln_elaborate::{ElaborationContext, IntoFragment};
use kiln_ir::codes::{W300, W301, W303, W304};
use kiln_ir::visit::{
    find_fsm_sugar, for_each_value, read_signals, rewrite_statements, signals_in, target_signals,
};
use kiln_ir::{
    BinaryOp, ClockDomain, ElabError, ElabResult, Fragment, PortDirection, Signal, Statement,
    Value,
};
use kiln_lower::{SpecialLowerer, SpecialOverrides};
use std::collections::BTreeSet;
use tracing::{debug, info_span};

/// Converts `top` to a Verilog module whose ports are `ios`.
///
/// Ports are listed in the order given. Each is an output if the design
/// drives it, bidirectional if a special uses it as a pad, and an input
/// otherwise. Clocks and resets of domains the design uses but does not
/// drive are appended as inputs.
///
/// # Errors
///
/// Any elaboration, lowering or checking error, `InvalidLintConfig` when a
/// deny or allow entry is not a warning code, and `DeniedWarning` when the
/// lint configuration promotes a warning.
pub fn convert(
    top: impl IntoFragment,
    ios: &[Signal],
    overrides: &SpecialOverrides,
    config: &KilnConfig,
) -> ElabResult<ConvertOutput> {
    let _span = info_span!("convert", module = %config.codegen.name).entered();
    let policy = lint_policy(config)?;
    let mut ctx = ElaborationContext::new(&config.elaborate);
    let fragment = top.into_fragment(&mut ctx)?;
    let mut diagnostics = ctx.sink.take_all();

    reject_fsm_sugar(&fragment)?;
    let mut fragment = SpecialLowerer::new(overrides).lower_fragment(fragment)?;
    check_values(&fragment)?;
    fragment.check_clock_domains()?;
    create_missing_domains(&mut fragment, config.codegen.create_clock_domains, &mut diagnostics)?;
    warn_unused_domains(&fragment, &mut diagnostics);
    let fragment = resolve_domain_refs(fragment)?;
    fragment.check_drivers()?;

    let ports = infer_ports(&fragment, ios);
    warn_undriven(&fragment, &ports, &mut diagnostics);
    warn_truncations(&fragment, &mut diagnostics);
    let diagnostics = apply_lints(&policy, diagnostics)?;

    let emitted = emit_module(&fragment, &ports, &config.codegen)?;
    debug!(
        ports = ports.len(),
        warnings = diagnostics.len(),
        bytes = emitted.source.len(),
        "conversion finished"
    );
    Ok(ConvertOutput::new(
        config.codegen.name.clone(),
        emitted.source,
        emitted.data_files,
        emitted.names,
        ports,
        diagnostics,
    ))
}

fn reject_fsm_sugar(fragment: &Fragment) -> ElabResult<()> {
    let unlowered = |st: &Statement, context: String| ElabError::UnloweredFsmStatement {
        statement: st.kind_name().to_string(),
        context,
    };
    if let Some(st) = find_fsm_sugar(&fragment.comb) {
        return Err(unlowered(st, "combinational logic".to_string()));
    }
    for (domain, stmts) in &fragment.sync {
        if let Some(st) = find_fsm_sugar(stmts) {
            return Err(unlowered(st, format!("sync domain `{domain}`")));
        }
    }
    Ok(())
}

fn check_values(fragment: &Fragment) -> ElabResult<()> {
    let mut result: ElabResult<()> = Ok(());
    let mut check = |v: &Value| {
        if result.is_ok() {
            result = v.check();
        }
    };
    for_each_value(&fragment.comb, &mut check);
    for stmts in fragment.sync.values() {
        for_each_value(stmts, &mut check);
    }
    for special in fragment.specials.values() {
        for port in special.ports() {
            check(&port.value);
        }
    }
    result
}

fn create_missing_domains(
    fragment: &mut Fragment,
    create: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> ElabResult<()> {
    let declared = fragment.declared_domains();
    for domain in fragment.used_domains() {
        if declared.contains(&domain) {
            continue;
        }
        if !create {
            return Err(ElabError::UnknownClockDomain { domain });
        }
        diagnostics.push(
            Diagnostic::warning(
                W300,
                format!("clock domain `{domain}` was used but never declared; created it"),
                Origin::unknown().with_item(domain.clone()),
            )
            .with_help("declare the domain explicitly to choose its reset behavior"),
        );
        fragment.add_clock_domain(ClockDomain::new(domain));
    }
    Ok(())
}

fn warn_unused_domains(fragment: &Fragment, diagnostics: &mut Vec<Diagnostic>) {
    let used = fragment.used_domains();
    for cd in &fragment.clock_domains {
        if !used.contains(&cd.name) {
            diagnostics.push(Diagnostic::warning(
                W301,
                format!("clock domain `{}` is declared but never used", cd.name),
                Origin::unknown().with_item(cd.name.clone()),
            ));
        }
    }
}

/// Replaces `ClockSignal`/`ResetSignal` references with the domain signals.
fn resolve_domain_refs(mut fragment: Fragment) -> ElabResult<Fragment> {
    let domains = fragment.clock_domains.clone();
    let mut error = None;
    let mut resolve = |v: &Value| -> Option<Value> {
        let found = match v {
            Value::ClockSignal { domain } => domains
                .iter()
                .find(|cd| cd.name == *domain)
                .map(|cd| Value::from(&cd.clk))
                .ok_or_else(|| ElabError::UnknownClockDomain {
                    domain: domain.clone(),
                }),
            Value::ResetSignal {
                domain,
                allow_reset_less,
            } => match domains.iter().find(|cd| cd.name == *domain) {
                None => Err(ElabError::UnknownClockDomain {
                    domain: domain.clone(),
                }),
                Some(ClockDomain { rst: Some(rst), .. }) => Ok(Value::from(rst)),
                Some(_) if *allow_reset_less => Ok(Value::sized(0, 1)),
                Some(_) => Err(ElabError::ResetLessDomain {
                    domain: domain.clone(),
                }),
            },
            _ => return None,
        };
        match found {
            Ok(value) => Some(value),
            Err(e) => {
                error.get_or_insert(e);
                Some(Value::sized(0, 1))
            }
        }
    };
    fragment.comb = rewrite_statements(&fragment.comb, &mut resolve);
    for stmts in fragment.sync.values_mut() {
        *stmts = rewrite_statements(stmts, &mut resolve);
    }
    for special in fragment.specials.values_mut() {
        special.map_values(&mut resolve);
    }
    match error {
        Some(e) => Err(e),
        None => Ok(fragment),
    }
}

/// Assigns directions to the requested ports and appends undriven domain
/// clocks and resets.
fn infer_ports(fragment: &Fragment, ios: &[Signal]) -> Vec<Port> {
    let driven = fragment.driven_signals();
    let mut pads = BTreeSet::new();
    for special in fragment.specials.values() {
        for port in special.ports() {
            if port.direction == PortDirection::InOut {
                target_signals(&port.value, &mut pads);
            }
        }
    }
    let mut seen = BTreeSet::new();
    let mut ports = Vec::new();
    for io in ios {
        if !seen.insert(io.clone()) {
            continue;
        }
        let direction = if pads.contains(io) {
            PortDirection::InOut
        } else if driven.contains(io) {
            PortDirection::Output
        } else {
            PortDirection::Input
        };
        ports.push(Port {
            signal: io.clone(),
            direction,
        });
    }
    for cd in &fragment.clock_domains {
        for s in std::iter::once(&cd.clk).chain(cd.rst.as_ref()) {
            if !driven.contains(s) && seen.insert(s.clone()) {
                ports.push(Port::input(s.clone()));
            }
        }
    }
    ports
}

fn warn_undriven(fragment: &Fragment, ports: &[Port], diagnostics: &mut Vec<Diagnostic>) {
    let driven = fragment.driven_signals();
    let ports: BTreeSet<&Signal> = ports.iter().map(|p| &p.signal).collect();
    let mut read = read_signals(&fragment.comb);
    for stmts in fragment.sync.values() {
        read.extend(read_signals(stmts));
    }
    for special in fragment.specials.values() {
        for port in special.ports() {
            if port.direction == PortDirection::Input {
                signals_in(&port.value, &mut read);
            }
        }
    }
    for s in read {
        if !driven.contains(&s) && !ports.contains(&s) {
            diagnostics.push(Diagnostic::warning(
                W303,
                format!(
                    "signal `{}` is read but never driven; it stays at its reset value",
                    s.name()
                ),
                Origin::unknown().with_item(s.name().to_string()),
            ));
        }
    }
}

fn warn_truncations(fragment: &Fragment, diagnostics: &mut Vec<Diagnostic>) {
    let mut check = |stmts: &[Statement]| {
        let mut found = Vec::new();
        collect_truncations(stmts, &mut found);
        for (lhs, rhs) in found {
            diagnostics.push(Diagnostic::warning(
                W304,
                format!(
                    "assignment to `{lhs}` ({} bits) truncates `{rhs}` ({} bits)",
                    lhs.shape().width,
                    rhs.shape().width
                ),
                Origin::unknown().with_item(lhs.to_string()),
            ));
        }
    };
    check(&fragment.comb);
    for stmts in fragment.sync.values() {
        check(stmts);
    }
}

fn collect_truncations(stmts: &[Statement], out: &mut Vec<(Value, Value)>) {
    for st in stmts {
        match st {
            Statement::Assign { lhs, rhs } => {
                let width = lhs.shape().width;
                if rhs.shape().width > width && !drops_only_carry(rhs, width) {
                    out.push((lhs.clone(), rhs.clone()));
                }
            }
            Statement::If {
                then_body,
                else_body,
                ..
            } => {
                collect_truncations(then_body, out);
                collect_truncations(else_body, out);
            }
            Statement::Case { arms, default, .. } => {
                for arm in arms {
                    collect_truncations(&arm.body, out);
                }
                if let Some(d) = default {
                    collect_truncations(d, out);
                }
            }
            Statement::NextState(_) | Statement::NextValue { .. } => {}
        }
    }
}

/// Wrapping counters: an add or subtract whose operands both fit the target
/// loses only its carry bit.
fn drops_only_carry(rhs: &Value, width: u32) -> bool {
    match rhs {
        Value::Binary {
            op: BinaryOp::Add | BinaryOp::Sub,
            lhs,
            rhs,
        } => lhs.shape().width <= width && rhs.shape().width <= width,
        _ => false,
    }
}

/// Every entry must parse; one bad code invalidates the whole policy.
fn lint_policy(config: &KilnConfig) -> ElabResult<LintPolicy> {
    config
        .lint
        .policy()
        .map_err(|e| ElabError::InvalidLintConfig {
            message: e.to_string(),
        })
}

fn apply_lints(policy: &LintPolicy, diagnostics: Vec<Diagnostic>) -> ElabResult<Vec<Diagnostic>> {
    let (kept, denied) = policy.apply(diagnostics);
    match denied {
        Some(diag) => Err(ElabError::DeniedWarning {
            code: diag.code,
            message: diag.message,
        }),
        None => Ok(kept),
    }
}
