//! Finite state machines.
//!
//! An [`Fsm`] collects per-state action lists that may use the
//! [`Statement::NextState`] and [`Statement::NextValue`] sugar. Compiling it
//! produces a binary-encoded state register, a combinational next-state
//! `Case` and plain registers for every `NextValue` target.
//!
//! States are encoded in the order they are first mentioned, starting at 0.
//! The reset state (the first state unless set explicitly) doubles as the
//! `Case` default, which also sends any unused encoding back to reset.

use crate::context::ElaborationContext;
use crate::module::Module;
use kiln_common::bits_for;
use kiln_diagnostics::Diagnostic;
use kiln_ir::visit::transform_statements;
use kiln_ir::{
    codes, CaseArm, Const, ElabError, ElabResult, Fragment, If, Shape, Signal, Statement, Value,
    ValueOps,
};
use num_bigint::BigInt;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A state machine under construction.
#[derive(Clone, Debug)]
pub struct Fsm {
    name: String,
    domain: Option<String>,
    reset_state: Option<String>,
    states: Vec<String>,
    actions: BTreeMap<String, Vec<Statement>>,
    aliases: BTreeMap<String, String>,
    anonymous: usize,
    before_entering: BTreeMap<String, Signal>,
    before_leaving: BTreeMap<String, Signal>,
    after_entering: BTreeMap<String, Signal>,
    after_leaving: BTreeMap<String, Signal>,
}

/// The output of [`Fsm::compile`].
#[derive(Clone, Debug)]
pub struct CompiledFsm {
    /// The state register, next-state logic and derived signals.
    pub fragment: Fragment,
    /// Code of every state.
    pub encoding: BTreeMap<String, u32>,
    /// The state register.
    pub state: Signal,
    /// The combinational next-state value.
    pub next_state: Signal,
    /// Code of the reset state, equal to the state register's reset value.
    pub reset_code: u32,
}

impl Fsm {
    /// Creates an empty state machine. `name` prefixes the generated signals.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: None,
            reset_state: None,
            states: Vec::new(),
            actions: BTreeMap::new(),
            aliases: BTreeMap::new(),
            anonymous: 0,
            before_entering: BTreeMap::new(),
            before_leaving: BTreeMap::new(),
            after_entering: BTreeMap::new(),
            after_leaving: BTreeMap::new(),
        }
    }

    /// Sets the state entered on reset.
    pub fn with_reset_state(mut self, state: impl Into<String>) -> Self {
        self.reset_state = Some(state.into());
        self
    }

    /// Clocks the state register from `domain` instead of the default domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// The machine's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// States in encoding order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    fn declare(&mut self, state: &str) {
        if !self.actions.contains_key(state) {
            self.states.push(state.to_string());
            self.actions.insert(state.to_string(), Vec::new());
        }
    }

    /// Appends statements executed combinationally while in `state`.
    pub fn act(&mut self, state: &str, stmts: impl IntoIterator<Item = Statement>) {
        self.declare(state);
        if let Some(body) = self.actions.get_mut(state) {
            body.extend(stmts);
        }
    }

    /// Makes `NextState(name)` reach `target` after `delay` extra cycles.
    ///
    /// The delay is built from a chain of anonymous states. A delay of zero
    /// makes `name` an alias of `target`.
    pub fn delayed_enter(&mut self, name: &str, target: &str, delay: u32) {
        if delay == 0 {
            self.aliases.insert(name.to_string(), target.to_string());
            return;
        }
        let mut state = name.to_string();
        for i in 0..delay {
            let next = if i + 1 == delay {
                target.to_string()
            } else {
                self.anonymous += 1;
                format!("{}${}", self.name, self.anonymous)
            };
            self.act(&state, [Statement::next_state(next.clone())]);
            state = next;
        }
    }

    /// A signal that is high while the machine is in `state`.
    pub fn ongoing(&mut self, state: &str) -> Signal {
        let signal = Signal::new(format!("{}_ongoing_{state}", self.name), 1);
        self.act(state, [signal.clone().assign(1)]);
        signal
    }

    fn event_signal(&mut self, kind: Event, state: &str) -> Signal {
        self.declare(state);
        let name = format!("{}_{}_{state}", self.name, kind.label());
        let map = match kind {
            Event::BeforeEntering => &mut self.before_entering,
            Event::BeforeLeaving => &mut self.before_leaving,
            Event::AfterEntering => &mut self.after_entering,
            Event::AfterLeaving => &mut self.after_leaving,
        };
        map.entry(state.to_string())
            .or_insert_with(|| Signal::new(name, 1))
            .clone()
    }

    /// High during the cycle before the machine enters `state`.
    ///
    /// For the reset state this is also high on the first cycle after reset.
    pub fn before_entering(&mut self, state: &str) -> Signal {
        self.event_signal(Event::BeforeEntering, state)
    }

    /// High during the last cycle spent in `state`.
    pub fn before_leaving(&mut self, state: &str) -> Signal {
        self.event_signal(Event::BeforeLeaving, state)
    }

    /// High during the first cycle spent in `state`.
    pub fn after_entering(&mut self, state: &str) -> Signal {
        self.event_signal(Event::AfterEntering, state)
    }

    /// High during the first cycle after leaving `state`.
    pub fn after_leaving(&mut self, state: &str) -> Signal {
        self.event_signal(Event::AfterLeaving, state)
    }

    fn resolve<'a>(&'a self, mut state: &'a str) -> &'a str {
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(state) {
                Some(target) => state = target.as_str(),
                None => break,
            }
        }
        state
    }

    fn unknown(&self, state: &str) -> ElabError {
        ElabError::UnknownFsmState {
            fsm: self.name.clone(),
            state: state.to_string(),
        }
    }

    /// Lowers the machine to plain logic.
    ///
    /// States that no transition ever targets produce a `W302` warning in
    /// `ctx`.
    pub fn compile(&self, ctx: &mut ElaborationContext) -> ElabResult<CompiledFsm> {
        let reset_state = match &self.reset_state {
            Some(s) => self.resolve(s).to_string(),
            None => self
                .states
                .first()
                .cloned()
                .ok_or_else(|| self.unknown("<reset>"))?,
        };
        let encoding: BTreeMap<String, u32> = self
            .states
            .iter()
            .enumerate()
            .map(|(code, s)| (s.clone(), code as u32))
            .collect();
        let reset_code = *encoding
            .get(&reset_state)
            .ok_or_else(|| self.unknown(&reset_state))?;

        let max_code = BigInt::from(self.states.len().saturating_sub(1));
        let width = bits_for(&max_code, false);
        let shape = Shape::unsigned(width);
        let code_of = |code: u32| Value::from(Const::sized(code, shape));

        let state = Signal::new(format!("{}_state", self.name), shape).with_reset(reset_code);
        let next_state = Signal::new(format!("{}_next_state", self.name), shape);
        let domain = self
            .domain
            .clone()
            .unwrap_or_else(|| ctx.default_domain.clone());

        let mut registers: Vec<NextValueRegister> = Vec::new();
        let mut targeted: BTreeSet<String> = BTreeSet::new();
        let mut lower = |st: Statement| -> ElabResult<Vec<Statement>> {
            match st {
                Statement::NextState(target) => {
                    let resolved = self.resolve(&target);
                    let code = *encoding.get(resolved).ok_or_else(|| self.unknown(&target))?;
                    targeted.insert(resolved.to_string());
                    Ok(vec![next_state.clone().assign(code_of(code))])
                }
                Statement::NextValue { target, value } => {
                    let reg = match registers.iter().position(|r| r.target == target) {
                        Some(i) => &registers[i],
                        None => {
                            registers.push(NextValueRegister::new(&self.name, target, registers.len()));
                            &registers[registers.len() - 1]
                        }
                    };
                    Ok(vec![reg.next.clone().assign(value), reg.ce.clone().assign(1)])
                }
                other => Ok(vec![other]),
            }
        };

        let mut arms = Vec::new();
        let mut default = vec![next_state.clone().assign(code_of(reset_code))];
        for s in &self.states {
            let body = transform_statements(&self.actions[s], &mut lower)?;
            if *s == reset_state {
                default.extend(body);
            } else {
                arms.push(CaseArm {
                    key: Const::sized(encoding[s], shape),
                    body,
                });
            }
        }

        let mut fragment = Fragment::new();
        fragment.add_comb([
            next_state.clone().assign(&state),
            Statement::Case {
                test: Value::from(&state),
                arms,
                default: Some(default),
            },
        ]);
        let mut sync = vec![state.clone().assign(&next_state)];
        for reg in &registers {
            sync.push(If::new(&reg.ce, [reg.target.clone().assign(&reg.next)]).into());
        }

        let is_in = |s: &str| state.clone().cmp_eq(code_of(encoding[s]));
        let goes_to = |s: &str| next_state.clone().cmp_eq(code_of(encoding[s]));
        let needs_init = self.before_entering.contains_key(&reset_state)
            || self.after_entering.contains_key(&reset_state);
        let init = needs_init.then(|| {
            let init = Signal::new(format!("{}_init", self.name), 1).with_reset(1);
            sync.push(init.clone().assign(0));
            init
        });
        let entering = |s: &str| {
            let edge = !is_in(s) & goes_to(s);
            match &init {
                Some(init) if s == reset_state => edge | init,
                _ => edge,
            }
        };
        let leaving = |s: &str| is_in(s) & !goes_to(s);

        for (s, sig) in &self.before_entering {
            fragment.add_comb([sig.clone().assign(entering(self.resolve(s)))]);
        }
        for (s, sig) in &self.before_leaving {
            fragment.add_comb([sig.clone().assign(leaving(self.resolve(s)))]);
        }
        for (s, sig) in &self.after_entering {
            sync.push(sig.clone().assign(entering(self.resolve(s))));
        }
        for (s, sig) in &self.after_leaving {
            sync.push(sig.clone().assign(leaving(self.resolve(s))));
        }
        fragment.add_sync(domain.clone(), sync);

        for s in &self.states {
            if *s != reset_state && !targeted.contains(s) {
                ctx.emit(
                    Diagnostic::warning(
                        codes::W302,
                        format!("state `{s}` of state machine `{}` is unreachable", self.name),
                        ctx.origin().with_item(s.clone()),
                    )
                    .with_help("add a `NextState` transition to it or remove it"),
                );
            }
        }

        debug!(
            fsm = %self.name,
            states = self.states.len(),
            width,
            domain = %domain,
            "compiled state machine"
        );
        Ok(CompiledFsm {
            fragment,
            encoding,
            state,
            next_state,
            reset_code,
        })
    }
}

impl From<Fsm> for Module {
    fn from(fsm: Fsm) -> Module {
        let mut module = Module::new(fsm.name.clone());
        module.set_finalizer(move |m: &mut Module, ctx: &mut ElaborationContext| {
            let compiled = fsm.compile(ctx)?;
            m.add_fragment(compiled.fragment);
            Ok(())
        });
        module
    }
}

#[derive(Clone, Copy)]
enum Event {
    BeforeEntering,
    BeforeLeaving,
    AfterEntering,
    AfterLeaving,
}

impl Event {
    fn label(self) -> &'static str {
        match self {
            Event::BeforeEntering => "before_entering",
            Event::BeforeLeaving => "before_leaving",
            Event::AfterEntering => "after_entering",
            Event::AfterLeaving => "after_leaving",
        }
    }
}

/// The staging pair behind one `NextValue` target.
struct NextValueRegister {
    target: Value,
    ce: Signal,
    next: Signal,
}

impl NextValueRegister {
    fn new(fsm: &str, target: Value, index: usize) -> Self {
        let base = match target.as_signal() {
            Some(s) => s.name().to_string(),
            None => format!("{fsm}_reg{index}"),
        };
        Self {
            ce: Signal::new(format!("{base}_fsm_ce"), 1),
            next: Signal::new(format!("{base}_fsm_next"), target.shape()),
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::visit::find_fsm_sugar;

    fn two_state() -> Fsm {
        let mut fsm = Fsm::new("fsm");
        fsm.act("IDLE", [Statement::next_state("RUN")]);
        fsm.act("RUN", [Statement::next_state("IDLE")]);
        fsm
    }

    fn case_of(f: &Fragment) -> (&Vec<CaseArm>, &Vec<Statement>) {
        match &f.comb[1] {
            Statement::Case {
                arms,
                default: Some(default),
                ..
            } => (arms, default),
            other => panic!("expected case, got {other:?}"),
        }
    }

    #[test]
    fn encoding_is_dense_and_ordered() {
        let mut fsm = two_state();
        fsm.act("DONE", Vec::new());
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        assert_eq!(compiled.encoding["IDLE"], 0);
        assert_eq!(compiled.encoding["RUN"], 1);
        assert_eq!(compiled.encoding["DONE"], 2);
        let codes: BTreeSet<_> = compiled.encoding.values().collect();
        assert_eq!(codes.len(), 3);
        assert_eq!(compiled.state.width(), 2);
        assert_eq!(compiled.state.reset(), &BigInt::from(compiled.reset_code));
    }

    #[test]
    fn explicit_reset_state() {
        let fsm = two_state().with_reset_state("RUN");
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        assert_eq!(compiled.reset_code, 1);
        assert_eq!(compiled.state.reset(), &BigInt::from(1));
    }

    #[test]
    fn default_arm_returns_to_reset() {
        let compiled = two_state()
            .compile(&mut ElaborationContext::default())
            .unwrap();
        let (arms, default) = case_of(&compiled.fragment);
        assert_eq!(arms.len(), 1);
        assert_eq!(arms[0].key, Const::sized(1, 1));
        assert_eq!(
            default[0],
            compiled
                .next_state
                .clone()
                .assign(Const::sized(compiled.reset_code, 1))
        );
        assert!(find_fsm_sugar(&compiled.fragment.comb).is_none());
    }

    #[test]
    fn state_register_updates_in_domain() {
        let fsm = two_state().with_domain("pix");
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        assert_eq!(
            compiled.fragment.sync["pix"][0],
            compiled.state.clone().assign(&compiled.next_state)
        );
    }

    #[test]
    fn unknown_target_rejected() {
        let mut fsm = Fsm::new("ctl");
        fsm.act("A", [Statement::next_state("NOPE")]);
        let err = fsm.compile(&mut ElaborationContext::default()).unwrap_err();
        assert_eq!(
            err,
            ElabError::UnknownFsmState {
                fsm: "ctl".into(),
                state: "NOPE".into()
            }
        );
    }

    #[test]
    fn unknown_reset_state_rejected() {
        let fsm = two_state().with_reset_state("BOOT");
        assert!(matches!(
            fsm.compile(&mut ElaborationContext::default()),
            Err(ElabError::UnknownFsmState { .. })
        ));
    }

    #[test]
    fn empty_fsm_rejected() {
        assert!(Fsm::new("e")
            .compile(&mut ElaborationContext::default())
            .is_err());
    }

    #[test]
    fn next_value_becomes_register() {
        let count = Signal::new("count", 8);
        let mut fsm = Fsm::new("fsm");
        fsm.act(
            "A",
            [
                Statement::next_value(&count, &count + 1),
                Statement::next_state("B"),
            ],
        );
        fsm.act("B", [Statement::next_value(&count, 0), Statement::next_state("A")]);
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        let sync = &compiled.fragment.sync["sys"];
        assert_eq!(sync.len(), 2);
        match &sync[1] {
            Statement::If {
                cond, then_body, ..
            } => {
                let ce = cond.as_signal().unwrap();
                assert_eq!(ce.name(), "count_fsm_ce");
                match &then_body[0] {
                    Statement::Assign { lhs, rhs } => {
                        assert_eq!(*lhs, Value::from(&count));
                        assert_eq!(rhs.as_signal().unwrap().name(), "count_fsm_next");
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delayed_enter_builds_chain() {
        let mut fsm = Fsm::new("d");
        fsm.act("IDLE", [Statement::next_state("WAIT")]);
        fsm.delayed_enter("WAIT", "DONE", 3);
        fsm.act("DONE", [Statement::next_state("IDLE")]);
        assert_eq!(fsm.states().len(), 5);
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        assert_eq!(compiled.encoding.len(), 5);
    }

    #[test]
    fn zero_delay_is_alias() {
        let mut fsm = Fsm::new("d");
        fsm.act("IDLE", [Statement::next_state("SKIP")]);
        fsm.delayed_enter("SKIP", "DONE", 0);
        fsm.act("DONE", [Statement::next_state("IDLE")]);
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        assert_eq!(compiled.encoding.len(), 2);
        let (arms, default) = case_of(&compiled.fragment);
        assert!(arms.len() == 1 && default.len() == 2);
        assert_eq!(
            default[1],
            compiled.next_state.clone().assign(Const::sized(1, 1))
        );
    }

    #[test]
    fn unreachable_state_warns() {
        let mut fsm = two_state();
        fsm.act("ORPHAN", Vec::new());
        let mut ctx = ElaborationContext::default();
        fsm.compile(&mut ctx).unwrap();
        let diags = ctx.sink.take_all();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::W302);
        assert_eq!(diags[0].origin.item.as_deref(), Some("ORPHAN"));
    }

    #[test]
    fn ongoing_assigns_in_state() {
        let mut fsm = two_state();
        let busy = fsm.ongoing("RUN");
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        let (arms, _) = case_of(&compiled.fragment);
        assert!(arms[0].body.contains(&busy.assign(1)));
    }

    #[test]
    fn event_signals_are_memoized() {
        let mut fsm = two_state();
        let a = fsm.before_entering("RUN");
        let b = fsm.before_entering("RUN");
        assert_eq!(a, b);
        let c = fsm.after_leaving("RUN");
        assert_ne!(a, c);
    }

    #[test]
    fn reset_state_entry_uses_init_flag() {
        let mut fsm = two_state();
        let entering = fsm.before_entering("IDLE");
        let compiled = fsm.compile(&mut ElaborationContext::default()).unwrap();
        let sync = &compiled.fragment.sync["sys"];
        let init = sync
            .iter()
            .find_map(|st| match st {
                Statement::Assign { lhs, .. } => lhs
                    .as_signal()
                    .filter(|s| s.name() == "fsm_init")
                    .cloned(),
                _ => None,
            })
            .unwrap();
        assert_eq!(init.reset(), &BigInt::from(1));
        assert!(compiled
            .fragment
            .comb
            .iter()
            .any(|st| matches!(st, Statement::Assign { lhs, .. } if *lhs == Value::from(&entering))));
    }

    #[test]
    fn fsm_into_module() {
        let mut top = Module::new("top");
        top.add_submodule(Some("ctl"), two_state()).unwrap();
        top.finalize().unwrap();
        assert_eq!(top.fragment().comb.len(), 2);
        assert_eq!(top.fragment().sync["sys"].len(), 1);
    }
}
