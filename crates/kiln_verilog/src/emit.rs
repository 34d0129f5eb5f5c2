//! Emitting a resolved fragment as one Verilog module.
//!
//! The fragment reaching this stage has no FSM sugar, no abstract specials
//! and no domain references left; every clock domain it uses is declared.
//! Emission order is fixed: header and ports, declarations, temporaries,
//! combinational assignments, one `always` block per clock domain, then
//! specials.

use crate::buffer::Buffer;
use crate::expr::{const_literal, shape_prefix};
use crate::fold::{fit, fold_comb, slice};
use crate::names::{NameScope, SignalNames};
use crate::output::{DataFile, Port};
use kiln_config::{CodegenConfig, MemoryInitStyle};
use kiln_ir::visit::{assigned_signals, for_each_value, signals_in};
use kiln_ir::{
    ClockDomain, ElabError, ElabResult, Fragment, PortDirection, Shape, Signal, Statement, Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// A hoisted subexpression.
#[derive(Debug)]
struct Temp {
    name: String,
    shape: Shape,
    text: String,
}

/// Printing state for one module.
#[derive(Debug)]
pub(crate) struct Emitter<'a> {
    pub(crate) names: SignalNames,
    pub(crate) scope: NameScope,
    pub(crate) hoisted: HashMap<Value, String>,
    pub(crate) data_files: Vec<DataFile>,
    pub(crate) memory_init: MemoryInitStyle,
    domains: &'a [ClockDomain],
    temps: Vec<Temp>,
}

/// The text of an emitted module and what it refers to.
#[derive(Debug)]
pub(crate) struct EmittedModule {
    pub(crate) source: String,
    pub(crate) data_files: Vec<DataFile>,
    pub(crate) names: BTreeMap<Signal, String>,
}

impl<'a> Emitter<'a> {
    fn new(names: SignalNames, scope: NameScope, domains: &'a [ClockDomain], memory_init: MemoryInitStyle) -> Self {
        Self {
            names,
            scope,
            hoisted: HashMap::new(),
            data_files: Vec::new(),
            memory_init,
            domains,
            temps: Vec::new(),
        }
    }

    /// A printer that knows only `signals`, named after themselves.
    #[cfg(test)]
    pub(crate) fn for_signals(signals: &[&Signal]) -> Emitter<'static> {
        let mut scope = NameScope::new();
        let names = SignalNames::assign(&mut scope, signals.iter().map(|s| (*s, s.name())));
        Emitter::new(names, scope, &[], MemoryInitStyle::Inline)
    }

    #[cfg(test)]
    pub(crate) fn temp_count(&self) -> usize {
        self.temps.len()
    }

    pub(crate) fn push_temp(&mut self, name: String, shape: Shape, text: String) {
        self.temps.push(Temp { name, shape, text });
    }

    /// The declared domain called `name`.
    pub(crate) fn domain(&self, name: &str) -> ElabResult<&'a ClockDomain> {
        self.domains
            .iter()
            .find(|cd| cd.name == name)
            .ok_or_else(|| ElabError::UnknownClockDomain {
                domain: name.to_string(),
            })
    }

    /// Prints a normalized assignment target.
    pub(crate) fn target(&mut self, target: &Value) -> String {
        match target {
            Value::Signal(s) => self.names.get(s).to_string(),
            Value::Slice { value, start, stop } => match value.as_ref() {
                Value::Signal(s) => {
                    let name = self.names.get(s).to_string();
                    if s.width() == 1 {
                        name
                    } else if stop - start == 1 {
                        format!("{name}[{start}]")
                    } else {
                        format!("{name}[{}:{start}]", stop - 1)
                    }
                }
                _ => self.expr(target),
            },
            Value::Concat(parts) => {
                let texts: Vec<String> = parts.iter().rev().map(|p| self.target(p)).collect();
                format!("{{{}}}", texts.join(", "))
            }
            other => self.expr(other),
        }
    }

    /// Emits a synchronous statement list with non-blocking assignments.
    fn statements(&mut self, buf: &mut Buffer, stmts: &[Statement]) {
        for st in stmts {
            match st {
                Statement::Assign { lhs, rhs } => {
                    self.assignment(buf, &normalize_target(lhs), rhs.clone())
                }
                Statement::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    let cond = self.operand(cond);
                    buf.line(format_args!("if ({cond}) begin"));
                    buf.push_tab();
                    self.statements(buf, then_body);
                    buf.pop_tab();
                    if else_body.is_empty() {
                        buf.line(format_args!("end"));
                    } else {
                        buf.line(format_args!("end else begin"));
                        buf.push_tab();
                        self.statements(buf, else_body);
                        buf.pop_tab();
                        buf.line(format_args!("end"));
                    }
                }
                Statement::Case {
                    test,
                    arms,
                    default,
                } => {
                    let test = self.operand(test);
                    buf.line(format_args!("case ({test})"));
                    buf.push_tab();
                    for arm in arms {
                        buf.line(format_args!("{}: begin", const_literal(&arm.key)));
                        buf.push_tab();
                        self.statements(buf, &arm.body);
                        buf.pop_tab();
                        buf.line(format_args!("end"));
                    }
                    if let Some(body) = default {
                        buf.line(format_args!("default: begin"));
                        buf.push_tab();
                        self.statements(buf, body);
                        buf.pop_tab();
                        buf.line(format_args!("end"));
                    }
                    buf.pop_tab();
                    buf.line(format_args!("endcase"));
                }
                // Rejected before emission.
                Statement::NextState(_) | Statement::NextValue { .. } => {}
            }
        }
    }

    fn assignment(&mut self, buf: &mut Buffer, target: &Value, rhs: Value) {
        match target {
            Value::Mux { selector, choices } => {
                if let [only] = choices.as_slice() {
                    self.assignment(buf, only, rhs);
                    return;
                }
                let width = selector.shape().width;
                let sel = self.operand(selector);
                buf.line(format_args!("case ({sel})"));
                buf.push_tab();
                let last = choices.len().saturating_sub(1);
                for (i, choice) in choices.iter().enumerate() {
                    if i == last {
                        buf.line(format_args!("default: begin"));
                    } else {
                        buf.line(format_args!("{width}'d{i}: begin"));
                    }
                    buf.push_tab();
                    self.assignment(buf, choice, rhs.clone());
                    buf.pop_tab();
                    buf.line(format_args!("end"));
                }
                buf.pop_tab();
                buf.line(format_args!("endcase"));
            }
            Value::Concat(parts) if parts.iter().any(contains_mux) => {
                let total = parts.iter().map(|p| p.shape().width).sum();
                let rhs = fit(rhs, total);
                let mut lo = 0;
                for part in parts {
                    let w = part.shape().width;
                    self.assignment(buf, part, slice(rhs.clone(), lo, lo + w));
                    lo += w;
                }
            }
            _ => {
                let width = target.shape().width;
                let lhs = self.target(target);
                let rhs = self.assign_rhs(&rhs, width);
                buf.line(format_args!("{lhs} <= {rhs};"));
            }
        }
    }

    /// Emits the `always` block of one clock domain.
    fn sync_block(&mut self, buf: &mut Buffer, cd: &ClockDomain, stmts: &[Statement]) {
        let clk = self.names.get(&cd.clk).to_string();
        let resettable: Vec<Signal> = assigned_signals(stmts)
            .into_iter()
            .filter(|s| !s.is_reset_less())
            .collect();
        let rst = match &cd.rst {
            Some(rst) if !resettable.is_empty() => Some(self.names.get(rst).to_string()),
            _ => None,
        };
        match rst {
            Some(rst) if cd.async_reset => {
                buf.line(format_args!("always @(posedge {clk} or posedge {rst}) begin"));
                buf.push_tab();
                buf.line(format_args!("if ({rst}) begin"));
                buf.push_tab();
                self.resets(buf, &resettable);
                buf.pop_tab();
                buf.line(format_args!("end else begin"));
                buf.push_tab();
                self.statements(buf, stmts);
                buf.pop_tab();
                buf.line(format_args!("end"));
                buf.pop_tab();
                buf.line(format_args!("end"));
            }
            Some(rst) => {
                buf.line(format_args!("always @(posedge {clk}) begin"));
                buf.push_tab();
                self.statements(buf, stmts);
                buf.line(format_args!("if ({rst}) begin"));
                buf.push_tab();
                self.resets(buf, &resettable);
                buf.pop_tab();
                buf.line(format_args!("end"));
                buf.pop_tab();
                buf.line(format_args!("end"));
            }
            None => {
                buf.line(format_args!("always @(posedge {clk}) begin"));
                buf.push_tab();
                self.statements(buf, stmts);
                buf.pop_tab();
                buf.line(format_args!("end"));
            }
        }
        buf.write_eol();
    }

    fn resets(&mut self, buf: &mut Buffer, signals: &[Signal]) {
        for s in signals {
            let value = crate::fold::reset_value(s);
            let Value::Const(c) = &value else { continue };
            buf.line(format_args!("{} <= {};", self.names.get(s), const_literal(c)));
        }
    }
}

/// Pushes slices inward so that every target is a signal, a slice of a
/// signal, a concatenation or a mux of such.
pub(crate) fn normalize_target(target: &Value) -> Value {
    match target {
        Value::Slice { value, start, stop } => match normalize_target(value) {
            Value::Mux { selector, choices } => Value::Mux {
                selector,
                choices: choices
                    .into_iter()
                    .map(|c| normalize_target(&slice(c, *start, *stop)))
                    .collect(),
            },
            Value::Concat(parts) => match slice(Value::Concat(parts), *start, *stop) {
                Value::Concat(picked) => Value::Concat(picked.iter().map(normalize_target).collect()),
                single => normalize_target(&single),
            },
            inner => slice(inner, *start, *stop),
        },
        Value::Concat(parts) => Value::Concat(parts.iter().map(normalize_target).collect()),
        Value::Mux { selector, choices } => Value::Mux {
            selector: selector.clone(),
            choices: choices.iter().map(normalize_target).collect(),
        },
        other => other.clone(),
    }
}

fn contains_mux(target: &Value) -> bool {
    match target {
        Value::Mux { .. } => true,
        Value::Concat(parts) => parts.iter().any(contains_mux),
        Value::Slice { value, .. } => contains_mux(value),
        _ => false,
    }
}

/// Every signal the fragment mentions, in ID order.
fn collect_signals(fragment: &Fragment) -> BTreeSet<Signal> {
    let mut all = BTreeSet::new();
    let mut collect = |v: &Value| signals_in(v, &mut all);
    for_each_value(&fragment.comb, &mut collect);
    for stmts in fragment.sync.values() {
        for_each_value(stmts, &mut collect);
    }
    for special in fragment.specials.values() {
        for port in special.ports() {
            collect(&port.value);
        }
    }
    for cd in &fragment.clock_domains {
        all.insert(cd.clk.clone());
        if let Some(rst) = &cd.rst {
            all.insert(rst.clone());
        }
    }
    all
}

/// Name hints: domain clocks and resets are named after their current domain.
fn name_hints(fragment: &Fragment) -> BTreeMap<Signal, String> {
    let mut hints = BTreeMap::new();
    for cd in &fragment.clock_domains {
        hints.insert(cd.clk.clone(), format!("{}_clk", cd.name));
        if let Some(rst) = &cd.rst {
            hints.insert(rst.clone(), format!("{}_rst", cd.name));
        }
    }
    hints
}

/// Emits `fragment` as a module with `ports`.
pub(crate) fn emit_module(
    fragment: &Fragment,
    ports: &[Port],
    config: &CodegenConfig,
) -> ElabResult<EmittedModule> {
    let all = collect_signals(fragment);
    let hints = name_hints(fragment);
    let port_set: BTreeSet<&Signal> = ports.iter().map(|p| &p.signal).collect();
    let ordered: Vec<&Signal> = ports
        .iter()
        .map(|p| &p.signal)
        .chain(all.iter().filter(|s| !port_set.contains(s)))
        .collect();

    let mut scope = NameScope::new();
    let names = SignalNames::assign(
        &mut scope,
        ordered
            .iter()
            .map(|s| (*s, hints.get(*s).map(String::as_str).unwrap_or_else(|| s.name()))),
    );
    let mut em = Emitter::new(names, scope, &fragment.clock_domains, config.memory_init);

    let comb_driven = assigned_signals(&fragment.comb);
    let mut sync_driven = BTreeSet::new();
    for stmts in fragment.sync.values() {
        sync_driven.extend(assigned_signals(stmts));
    }
    let driven = fragment.driven_signals();

    // Port list.
    let mut header = Buffer::new();
    if config.header {
        header.line(format_args!("/* Machine-generated using kiln */"));
    }
    header.line(format_args!("module {}(", config.name));
    header.push_tab();
    for (i, port) in ports.iter().enumerate() {
        let direction = match port.direction {
            PortDirection::Input => "input",
            PortDirection::Output if sync_driven.contains(&port.signal) => "output reg",
            PortDirection::Output => "output",
            PortDirection::InOut => "inout",
        };
        let sep = if i + 1 < ports.len() { "," } else { "" };
        header.line(format_args!(
            "{direction} {}{}{sep}",
            shape_prefix(port.signal.shape()),
            em.names.get(&port.signal)
        ));
    }
    header.pop_tab();
    header.line(format_args!(");"));
    header.write_eol();

    // Declarations.
    let mut decls = Buffer::new();
    for s in ordered.iter().filter(|s| !port_set.contains(*s)) {
        let name = em.names.get(s).to_string();
        let prefix = shape_prefix(s.shape());
        let reset = const_literal(&kiln_ir::Const::sized(s.reset().clone(), s.shape()));
        if sync_driven.contains(*s) {
            if config.asic_syntax {
                decls.line(format_args!("reg {prefix}{name};"));
            } else {
                decls.line(format_args!("reg {prefix}{name} = {reset};"));
            }
        } else if comb_driven.contains(*s) || driven.contains(*s) {
            decls.line(format_args!("wire {prefix}{name};"));
        } else {
            decls.line(format_args!("wire {prefix}{name} = {reset};"));
        }
    }
    if !config.asic_syntax {
        for port in ports.iter().filter(|p| sync_driven.contains(&p.signal)) {
            let reset = kiln_ir::Const::sized(port.signal.reset().clone(), port.signal.shape());
            decls.line(format_args!(
                "initial {} = {};",
                em.names.get(&port.signal),
                const_literal(&reset)
            ));
        }
    }

    // Combinational logic.
    let mut comb = Buffer::new();
    let folded = fold_comb(&fragment.comb);
    for s in &ordered {
        if let Some(value) = folded.get(*s) {
            let rhs = em.assign_rhs(value, s.width());
            comb.line(format_args!("assign {} = {rhs};", em.names.get(s)));
        }
    }

    // Synchronous logic.
    let mut sync = Buffer::new();
    for (domain, stmts) in &fragment.sync {
        if stmts.is_empty() {
            continue;
        }
        let cd = em.domain(domain)?;
        em.sync_block(&mut sync, cd, stmts);
    }

    // Specials.
    let mut specials = Buffer::new();
    for special in fragment.specials.values() {
        em.special(&mut specials, special)?;
    }

    let mut temps_decl = Buffer::new();
    let mut temps_assign = Buffer::new();
    for temp in &em.temps {
        temps_decl.line(format_args!("wire {}{};", shape_prefix(temp.shape), temp.name));
        temps_assign.line(format_args!("assign {} = {};", temp.name, temp.text));
    }
    debug!(
        module = %config.name,
        signals = ordered.len(),
        temporaries = em.temps.len(),
        "emitted module"
    );

    let mut source = header.into_string();
    source.push_str(&decls.into_string());
    source.push_str(&temps_decl.into_string());
    source.push('\n');
    source.push_str(&temps_assign.into_string());
    source.push_str(&comb.into_string());
    source.push('\n');
    source.push_str(&sync.into_string());
    source.push_str(&specials.into_string());
    source.push_str("endmodule\n");

    Ok(EmittedModule {
        source,
        data_files: em.data_files,
        names: em.names.into_map(),
    })
}
