//! Cycle-based simulation kernel.
//!
//! [`Simulator`] evaluates a flat [`Fragment`] one clock edge at a time.
//! Construction resolves clock and reset references, groups combinational
//! statements into processes and orders them topologically, so settling is
//! a single pass. A tick runs one domain's synchronous statements with
//! non-blocking semantics, applies its memory ports, commits, and settles
//! again.

use crate::error::SimError;
use crate::eval::{reset_of, Frame, State};
use kiln_common::{mask, to_bits, wrap};
use kiln_ir::special::SpecialKind;
use kiln_ir::visit::{assigned_signals, find_fsm_sugar, read_signals, rewrite_statements};
use kiln_ir::{ClockDomain, Fragment, Memory, MemoryPort, Signal, Statement, Value, WriteMode};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// A unit of combinational evaluation.
#[derive(Debug)]
enum CombNode {
    /// Top-level statements that assign overlapping signals, in order.
    Process {
        stmts: Vec<Statement>,
        writes: BTreeSet<Signal>,
    },
    /// An asynchronous memory read.
    AsyncRead { memory: usize, port: usize },
    /// A write-first read through the port's registered address.
    RegisteredRead { memory: usize, port: usize },
}

/// A memory with its current contents.
#[derive(Debug)]
struct MemoryState {
    memory: Memory,
    words: Vec<BigInt>,
    /// Registered addresses of write-first read ports, by port index.
    latched: BTreeMap<usize, BigInt>,
}

impl MemoryState {
    fn read(&self, adr: &BigInt) -> BigInt {
        adr.to_usize()
            .and_then(|i| self.words.get(i))
            .cloned()
            .unwrap_or_else(BigInt::zero)
    }
}

/// A cycle-based evaluator for one flat fragment.
#[derive(Debug)]
pub struct Simulator {
    state: State,
    comb: Vec<CombNode>,
    sync: BTreeMap<String, Vec<Statement>>,
    domains: Vec<ClockDomain>,
    memories: Vec<MemoryState>,
    cycles: BTreeMap<String, u64>,
}

impl Simulator {
    /// Prepares `fragment` for simulation and settles its initial state.
    ///
    /// # Errors
    ///
    /// `Unsupported` for specials other than memories and for FSM statements
    /// outside an FSM, `UnknownDomain` for references to undeclared domains,
    /// `CombinationalLoop` when combinational logic feeds back into itself,
    /// and `Elab` when a signal has more than one driver.
    pub fn new(fragment: &Fragment) -> Result<Self, SimError> {
        fragment.check_drivers()?;
        let domains = fragment.clock_domains.clone();
        let mut resolve_error = None;
        let mut resolve = |v: &Value| resolve_domain_ref(v, &domains, &mut resolve_error);

        if find_fsm_sugar(&fragment.comb).is_some()
            || fragment.sync.values().any(|s| find_fsm_sugar(s).is_some())
        {
            return Err(SimError::Unsupported {
                reason: "`NextState`/`NextValue` outside of an FSM".to_string(),
            });
        }
        let comb_stmts = rewrite_statements(&fragment.comb, &mut resolve);
        let sync: BTreeMap<String, Vec<Statement>> = fragment
            .sync
            .iter()
            .map(|(d, stmts)| (d.clone(), rewrite_statements(stmts, &mut resolve)))
            .collect();
        if let Some(err) = resolve_error {
            return Err(err);
        }

        let mut memories = Vec::new();
        for special in fragment.specials.values() {
            match &special.kind {
                SpecialKind::Memory(mem) => {
                    let mut words = vec![BigInt::zero(); mem.depth];
                    for (word, init) in words.iter_mut().zip(&mem.init) {
                        *word = init.clone();
                    }
                    let latched = mem
                        .ports
                        .iter()
                        .enumerate()
                        .filter(|(_, p)| !p.async_read && p.mode == WriteMode::WriteFirst)
                        .map(|(i, _)| (i, BigInt::zero()))
                        .collect();
                    memories.push(MemoryState {
                        memory: mem.clone(),
                        words,
                        latched,
                    });
                }
                _ => {
                    return Err(SimError::Unsupported {
                        reason: format!("special {} must be lowered first", special.describe()),
                    })
                }
            }
        }

        let comb = order_comb(group_processes(comb_stmts), &memories)?;
        let mut state = State::new();
        let mut everything = BTreeSet::new();
        let mut collect = |stmts: &[Statement]| {
            everything.extend(assigned_signals(stmts));
            everything.extend(read_signals(stmts));
        };
        collect(&fragment.comb);
        for stmts in sync.values() {
            collect(stmts);
        }
        for cd in &domains {
            everything.insert(cd.clk.clone());
            everything.extend(cd.rst.clone());
        }
        for s in everything {
            let v = reset_of(&s);
            state.insert(s, v);
        }

        debug!(
            signals = state.len(),
            comb_nodes = comb.len(),
            domains = sync.len(),
            memories = memories.len(),
            "simulator ready"
        );
        let mut sim = Self {
            state,
            comb,
            sync,
            domains,
            memories,
            cycles: BTreeMap::new(),
        };
        sim.settle()?;
        Ok(sim)
    }

    /// The current value of `signal`.
    pub fn peek(&self, signal: &Signal) -> BigInt {
        self.state
            .get(signal)
            .cloned()
            .unwrap_or_else(|| reset_of(signal))
    }

    /// Drives `signal` from outside. Takes effect at the next settle.
    pub fn poke(&mut self, signal: &Signal, value: impl Into<BigInt>) {
        let v = wrap(&value.into(), signal.width(), signal.is_signed());
        self.state.insert(signal.clone(), v);
    }

    /// Contents of the memory named `name`.
    pub fn memory(&self, name: &str) -> Option<&[BigInt]> {
        self.memories
            .iter()
            .find(|m| m.memory.name == name)
            .map(|m| m.words.as_slice())
    }

    /// Number of ticks `domain` has seen.
    pub fn cycles(&self, domain: &str) -> u64 {
        self.cycles.get(domain).copied().unwrap_or(0)
    }

    /// Re-evaluates combinational logic, then applies asserted asynchronous
    /// resets.
    pub fn settle(&mut self) -> Result<(), SimError> {
        self.settle_comb()?;
        if self.apply_async_resets() {
            self.settle_comb()?;
        }
        Ok(())
    }

    /// Advances `domain` by one clock edge.
    ///
    /// # Errors
    ///
    /// `UnknownDomain` if no statement, declaration or memory port uses
    /// `domain`.
    pub fn tick(&mut self, domain: &str) -> Result<(), SimError> {
        let known = self.sync.contains_key(domain)
            || self.domains.iter().any(|cd| cd.name == domain)
            || self
                .memories
                .iter()
                .any(|m| m.memory.ports.iter().any(|p| p.domain == domain));
        if !known {
            return Err(SimError::UnknownDomain {
                domain: domain.to_string(),
            });
        }
        self.settle()?;

        let mut writes = {
            let mut frame = Frame::clocked(&self.state);
            if let Some(stmts) = self.sync.get(domain) {
                frame.exec(stmts)?;
            }
            frame.writes
        };
        if let Some(stmts) = self.sync.get(domain) {
            if self.in_reset(domain) {
                for s in assigned_signals(stmts) {
                    if !s.is_reset_less() {
                        let v = reset_of(&s);
                        writes.insert(s, v);
                    }
                }
            }
        }
        let ports = self.memory_ports(domain);
        writes.extend(ports);
        self.state.extend(writes);
        *self.cycles.entry(domain.to_string()).or_default() += 1;
        trace!(domain, cycle = self.cycles(domain), "tick");
        self.settle()
    }

    /// Ticks `domain` `n` times.
    pub fn run(&mut self, domain: &str, n: usize) -> Result<(), SimError> {
        for _ in 0..n {
            self.tick(domain)?;
        }
        Ok(())
    }

    fn in_reset(&self, domain: &str) -> bool {
        self.domains
            .iter()
            .find(|cd| cd.name == domain)
            .and_then(|cd| cd.rst.as_ref())
            .is_some_and(|rst| !self.peek(rst).is_zero())
    }

    fn settle_comb(&mut self) -> Result<(), SimError> {
        for node in &self.comb {
            match node {
                CombNode::Process { stmts, writes } => {
                    let results = {
                        let mut frame = Frame::blocking(&self.state);
                        for s in writes {
                            frame.writes.insert(s.clone(), reset_of(s));
                        }
                        frame.exec(stmts)?;
                        frame.writes
                    };
                    self.state.extend(results);
                }
                CombNode::AsyncRead { memory, port } => {
                    let mem = &self.memories[*memory];
                    let p = &mem.memory.ports[*port];
                    let v = mem.read(&self.peek(&p.adr));
                    self.state.insert(p.dat_r.clone(), v);
                }
                CombNode::RegisteredRead { memory, port } => {
                    let mem = &self.memories[*memory];
                    let p = &mem.memory.ports[*port];
                    let v = mem
                        .latched
                        .get(port)
                        .map_or_else(BigInt::zero, |adr| mem.read(adr));
                    self.state.insert(p.dat_r.clone(), v);
                }
            }
        }
        Ok(())
    }

    fn apply_async_resets(&mut self) -> bool {
        let mut changed = false;
        for cd in &self.domains {
            let asserted = cd.async_reset
                && cd.rst.as_ref().is_some_and(|rst| {
                    self.state.get(rst).is_some_and(|v| !v.is_zero())
                });
            if !asserted {
                continue;
            }
            let Some(stmts) = self.sync.get(&cd.name) else {
                continue;
            };
            for s in assigned_signals(stmts) {
                let v = reset_of(&s);
                if !s.is_reset_less() && self.state.get(&s) != Some(&v) {
                    self.state.insert(s, v);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Performs the writes and synchronous reads of every memory port in
    /// `domain`, returning the new read data registers. Write-first ports
    /// latch their address instead; their data follows at the next settle.
    fn memory_ports(&mut self, domain: &str) -> Vec<(Signal, BigInt)> {
        let mut reads = Vec::new();
        for i in 0..self.memories.len() {
            let before = self.memories[i].words.clone();
            let ports: Vec<(usize, MemoryPort)> = self.memories[i]
                .memory
                .ports
                .iter()
                .enumerate()
                .filter(|(_, p)| p.domain == domain)
                .map(|(k, p)| (k, p.clone()))
                .collect();
            for (_, p) in &ports {
                self.write_port(i, p);
            }
            for (k, p) in ports.iter().filter(|(_, p)| !p.async_read) {
                let enabled = p.re.as_ref().map_or(true, |re| !self.peek(re).is_zero());
                let writing = p.we.as_ref().is_some_and(|we| !self.peek(we).is_zero());
                if !enabled || (p.mode == WriteMode::NoChange && writing) {
                    continue;
                }
                let adr = self.peek(&p.adr);
                match p.mode {
                    WriteMode::WriteFirst => {
                        self.memories[i].latched.insert(*k, adr);
                    }
                    WriteMode::ReadFirst | WriteMode::NoChange => {
                        let v = adr
                            .to_usize()
                            .and_then(|a| before.get(a))
                            .cloned()
                            .unwrap_or_else(BigInt::zero);
                        reads.push((p.dat_r.clone(), v));
                    }
                }
            }
        }
        reads
    }

    fn write_port(&mut self, index: usize, port: &MemoryPort) {
        let (Some(we), Some(dat_w)) = (&port.we, &port.dat_w) else {
            return;
        };
        let we = to_bits(&self.peek(we), we.width());
        if we.is_zero() {
            return;
        }
        let data = to_bits(&self.peek(dat_w), dat_w.width());
        let adr = self.peek(&port.adr);
        let mem = &mut self.memories[index];
        let width = mem.memory.width;
        let lanes = port.lanes(width);
        let Some(word) = adr.to_usize().and_then(|a| mem.words.get_mut(a)) else {
            return;
        };
        let lane_width = width / lanes;
        let mut merged = word.clone();
        for lane in 0..lanes {
            if !we.bit(u64::from(lane)) {
                continue;
            }
            let lo = (lane * lane_width) as usize;
            let field = mask(lane_width) << lo;
            merged = (merged & (mask(width) ^ &field)) | (&data & &field);
        }
        *word = merged;
    }
}

/// Replaces a domain reference with the domain's signal, recording the first
/// failure in `error`.
fn resolve_domain_ref(
    v: &Value,
    domains: &[ClockDomain],
    error: &mut Option<SimError>,
) -> Option<Value> {
    let (domain, resolved) = match v {
        Value::ClockSignal { domain } => (
            domain,
            domains
                .iter()
                .find(|cd| cd.name == *domain)
                .map(|cd| Value::from(&cd.clk)),
        ),
        Value::ResetSignal {
            domain,
            allow_reset_less,
        } => (
            domain,
            domains.iter().find(|cd| cd.name == *domain).and_then(|cd| {
                match &cd.rst {
                    Some(rst) => Some(Value::from(rst)),
                    None if *allow_reset_less => Some(Value::sized(0, 1)),
                    None => None,
                }
            }),
        ),
        _ => return None,
    };
    if resolved.is_none() {
        error.get_or_insert(SimError::UnknownDomain {
            domain: domain.clone(),
        });
    }
    Some(resolved.unwrap_or_else(|| Value::sized(0, 1)))
}

/// Splits top-level combinational statements into processes: statements
/// that assign a common signal stay together, in their original order.
fn group_processes(stmts: Vec<Statement>) -> Vec<CombNode> {
    let mut groups: Vec<(Vec<usize>, BTreeSet<Signal>)> = Vec::new();
    for (i, st) in stmts.iter().enumerate() {
        let mut merged = (vec![i], assigned_signals(std::slice::from_ref(st)));
        let mut rest = Vec::with_capacity(groups.len() + 1);
        for g in groups {
            if merged.1.is_disjoint(&g.1) {
                rest.push(g);
            } else {
                merged.0.extend(g.0);
                merged.1.extend(g.1);
            }
        }
        merged.0.sort_unstable();
        rest.push(merged);
        groups = rest;
    }
    groups
        .into_iter()
        .map(|(indices, writes)| CombNode::Process {
            stmts: indices.into_iter().map(|i| stmts[i].clone()).collect(),
            writes,
        })
        .collect()
}

/// Orders combinational nodes so that every node runs after the nodes
/// driving what it reads.
fn order_comb(mut nodes: Vec<CombNode>, memories: &[MemoryState]) -> Result<Vec<CombNode>, SimError> {
    for (m, mem) in memories.iter().enumerate() {
        for (p, port) in mem.memory.ports.iter().enumerate() {
            if port.async_read {
                nodes.push(CombNode::AsyncRead { memory: m, port: p });
            } else if port.mode == WriteMode::WriteFirst {
                nodes.push(CombNode::RegisteredRead { memory: m, port: p });
            }
        }
    }

    let outputs = |node: &CombNode| -> BTreeSet<Signal> {
        match node {
            CombNode::Process { writes, .. } => writes.clone(),
            CombNode::AsyncRead { memory, port } | CombNode::RegisteredRead { memory, port } => {
                std::iter::once(memories[*memory].memory.ports[*port].dat_r.clone()).collect()
            }
        }
    };
    let inputs = |node: &CombNode| -> BTreeSet<Signal> {
        match node {
            CombNode::Process { stmts, .. } => read_signals(stmts),
            CombNode::AsyncRead { memory, port } => {
                std::iter::once(memories[*memory].memory.ports[*port].adr.clone()).collect()
            }
            CombNode::RegisteredRead { .. } => BTreeSet::new(),
        }
    };

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let indices: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();
    let mut driver: BTreeMap<Signal, usize> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        for s in outputs(node) {
            driver.insert(s, i);
        }
    }
    for (i, node) in nodes.iter().enumerate() {
        for s in inputs(node) {
            match driver.get(&s) {
                Some(&d) if d != i => {
                    graph.update_edge(indices[d], indices[i], ());
                }
                _ => {}
            }
        }
    }
    let order = toposort(&graph, None).map_err(|cycle| {
        let node = &nodes[graph[cycle.node_id()]];
        let signal = outputs(node)
            .into_iter()
            .next()
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        SimError::CombinationalLoop { signal }
    })?;
    let mut slots: Vec<Option<CombNode>> = nodes.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|ix| slots[graph[ix]].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::special::MultiReg;
    use kiln_ir::{If, PortSpec, Special, ValueOps};

    fn counter() -> (Fragment, Signal) {
        let count = Signal::new("count", 4);
        let mut f = Fragment::new();
        f.add_sync("sys", [count.clone().assign(&count + 1)]);
        f.add_clock_domain(ClockDomain::new("sys"));
        (f, count)
    }

    #[test]
    fn counter_counts_and_wraps() {
        let (f, count) = counter();
        let mut sim = Simulator::new(&f).unwrap();
        sim.run("sys", 17).unwrap();
        assert_eq!(sim.peek(&count), BigInt::from(1));
        assert_eq!(sim.cycles("sys"), 17);
    }

    #[test]
    fn sync_reset_restores_registers() {
        let (f, count) = counter();
        let rst = f.clock_domains[0].rst.clone().unwrap();
        let mut sim = Simulator::new(&f).unwrap();
        sim.run("sys", 5).unwrap();
        sim.poke(&rst, 1);
        sim.tick("sys").unwrap();
        assert_eq!(sim.peek(&count), BigInt::from(0));
    }

    #[test]
    fn async_reset_applies_on_settle() {
        let q = Signal::new("q", 1);
        let mut f = Fragment::new();
        f.add_sync("sys", [q.clone().assign(1)]);
        let cd = ClockDomain::new("sys").with_async_reset();
        let rst = cd.rst.clone().unwrap();
        f.add_clock_domain(cd);
        let mut sim = Simulator::new(&f).unwrap();
        sim.tick("sys").unwrap();
        assert_eq!(sim.peek(&q), BigInt::from(1));
        sim.poke(&rst, 1);
        sim.settle().unwrap();
        assert_eq!(sim.peek(&q), BigInt::from(0));
    }

    #[test]
    fn comb_settles_in_dependency_order() {
        let a = Signal::new("a", 4);
        let b = Signal::new("b", 4);
        let c = Signal::new("c", 4).with_reset(9);
        let sel = Signal::new("sel", 1);
        let mut f = Fragment::new();
        // Listed consumer first.
        f.add_comb([
            b.clone().assign(&a + 1),
            a.clone().assign(2),
            If::new(&sel, [c.clone().assign(&b)]).into(),
        ]);
        let mut sim = Simulator::new(&f).unwrap();
        assert_eq!(sim.peek(&b), BigInt::from(3));
        assert_eq!(sim.peek(&c), BigInt::from(9));
        sim.poke(&sel, 1);
        sim.settle().unwrap();
        assert_eq!(sim.peek(&c), BigInt::from(3));
    }

    #[test]
    fn comb_loop_is_reported() {
        let a = Signal::new("a", 1);
        let b = Signal::new("b", 1);
        let mut f = Fragment::new();
        f.add_comb([a.clone().assign(&b), b.clone().assign(!&a)]);
        let err = Simulator::new(&f).unwrap_err();
        assert!(matches!(err, SimError::CombinationalLoop { .. }));
    }

    #[test]
    fn unknown_domain() {
        let (f, _) = counter();
        let mut sim = Simulator::new(&f).unwrap();
        assert_eq!(
            sim.tick("pix").unwrap_err(),
            SimError::UnknownDomain {
                domain: "pix".into()
            }
        );
        let y = Signal::new("y", 1);
        let mut g = Fragment::new();
        g.add_comb([y.assign(Value::reset("nowhere"))]);
        assert!(matches!(
            Simulator::new(&g).unwrap_err(),
            SimError::UnknownDomain { .. }
        ));
    }

    #[test]
    fn abstract_specials_are_rejected() {
        let i = Signal::new("i", 1);
        let o = Signal::new("o", 1);
        let mut f = Fragment::new();
        f.add_special(Special::new(MultiReg {
            input: Value::from(&i),
            output: o,
            odomain: "sys".into(),
            stages: 2,
        }));
        assert!(matches!(
            Simulator::new(&f).unwrap_err(),
            SimError::Unsupported { .. }
        ));
    }

    fn memory_fragment(mode: WriteMode) -> (Fragment, MemoryPort) {
        let mut mem = Memory::new("mem", 8, 4).with_init([10u32, 20, 30, 40]);
        let port = mem.add_port(PortSpec::write("p").mode(mode)).unwrap();
        let mut f = Fragment::new();
        f.add_special(Special::new(mem));
        f.add_clock_domain(ClockDomain::new("sys"));
        (f, port)
    }

    fn write_once(mode: WriteMode) -> (Simulator, MemoryPort) {
        let (f, port) = memory_fragment(mode);
        let mut sim = Simulator::new(&f).unwrap();
        sim.poke(&port.adr, 1);
        sim.poke(port.we.as_ref().unwrap(), 1);
        sim.poke(port.dat_w.as_ref().unwrap(), 99);
        sim.tick("sys").unwrap();
        (sim, port)
    }

    #[test]
    fn memory_read_first() {
        let (sim, port) = write_once(WriteMode::ReadFirst);
        assert_eq!(sim.peek(&port.dat_r), BigInt::from(20));
        assert_eq!(sim.memory("mem").unwrap()[1], BigInt::from(99));
    }

    #[test]
    fn memory_write_first() {
        let (sim, port) = write_once(WriteMode::WriteFirst);
        assert_eq!(sim.peek(&port.dat_r), BigInt::from(99));
    }

    #[test]
    fn write_first_follows_later_writes() {
        let mut mem = Memory::new("mem", 8, 4).with_init([10u32, 20, 30, 40]);
        let w = mem.add_port(PortSpec::write("w")).unwrap();
        let r = mem
            .add_port(PortSpec::read("r").mode(WriteMode::WriteFirst).with_re())
            .unwrap();
        let re = r.re.clone().unwrap();
        let mut f = Fragment::new();
        f.add_special(Special::new(mem));
        f.add_clock_domain(ClockDomain::new("sys"));
        let mut sim = Simulator::new(&f).unwrap();

        sim.poke(&r.adr, 3);
        sim.poke(&re, 1);
        sim.tick("sys").unwrap();
        assert_eq!(sim.peek(&r.dat_r), BigInt::from(40));

        // Address 3 stays latched while re is low; the write still shows.
        sim.poke(&re, 0);
        sim.poke(&w.adr, 3);
        sim.poke(w.we.as_ref().unwrap(), 1);
        sim.poke(w.dat_w.as_ref().unwrap(), 77);
        sim.tick("sys").unwrap();
        assert_eq!(sim.peek(&r.dat_r), BigInt::from(77));
    }

    #[test]
    fn memory_no_change() {
        let (mut sim, port) = write_once(WriteMode::NoChange);
        assert_eq!(sim.peek(&port.dat_r), BigInt::from(0));
        sim.poke(port.we.as_ref().unwrap(), 0);
        sim.tick("sys").unwrap();
        assert_eq!(sim.peek(&port.dat_r), BigInt::from(99));
    }

    #[test]
    fn memory_lanes_and_async_read() {
        let mut mem = Memory::new("m", 16, 2);
        let w = mem.add_port(PortSpec::write("w").we_granularity(8)).unwrap();
        let r = mem.add_port(PortSpec::read("r").async_read()).unwrap();
        let mut f = Fragment::new();
        f.add_special(Special::new(mem));
        let mut sim = Simulator::new(&f).unwrap();
        sim.poke(&w.adr, 0);
        sim.poke(&r.adr, 0);
        sim.poke(w.we.as_ref().unwrap(), 0b10);
        sim.poke(w.dat_w.as_ref().unwrap(), 0xabcd);
        sim.tick("sys").unwrap();
        assert_eq!(sim.peek(&r.dat_r), BigInt::from(0xab00));
    }
}
