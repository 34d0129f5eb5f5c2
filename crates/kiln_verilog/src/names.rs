//! Identifier legalization and collision-free naming.
//!
//! Every signal, instance and temporary in the emitted module draws its name
//! from one [`NameScope`]. Hints are legalized first (illegal characters
//! replaced, keywords escaped), then suffixed `_1`, `_2`, ... until unique.
//! The order in which names are claimed is the only thing that decides who
//! gets the unsuffixed form, which keeps the output independent of signal IDs.

use kiln_ir::Signal;
use std::collections::{BTreeMap, BTreeSet};

/// Returns `true` if `word` is a reserved Verilog-2001 keyword.
pub fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "always"
            | "and"
            | "assign"
            | "automatic"
            | "begin"
            | "buf"
            | "bufif0"
            | "bufif1"
            | "case"
            | "casex"
            | "casez"
            | "cell"
            | "cmos"
            | "config"
            | "deassign"
            | "default"
            | "defparam"
            | "design"
            | "disable"
            | "edge"
            | "else"
            | "end"
            | "endcase"
            | "endconfig"
            | "endfunction"
            | "endgenerate"
            | "endmodule"
            | "endprimitive"
            | "endspecify"
            | "endtable"
            | "endtask"
            | "event"
            | "for"
            | "force"
            | "forever"
            | "fork"
            | "function"
            | "generate"
            | "genvar"
            | "highz0"
            | "highz1"
            | "if"
            | "ifnone"
            | "initial"
            | "inout"
            | "input"
            | "instance"
            | "integer"
            | "join"
            | "large"
            | "liblist"
            | "library"
            | "localparam"
            | "macromodule"
            | "medium"
            | "module"
            | "nand"
            | "negedge"
            | "nmos"
            | "nor"
            | "not"
            | "notif0"
            | "notif1"
            | "or"
            | "output"
            | "parameter"
            | "pmos"
            | "posedge"
            | "primitive"
            | "pull0"
            | "pull1"
            | "pulldown"
            | "pullup"
            | "rcmos"
            | "real"
            | "realtime"
            | "reg"
            | "release"
            | "repeat"
            | "rnmos"
            | "rpmos"
            | "rtran"
            | "rtranif0"
            | "rtranif1"
            | "scalared"
            | "signed"
            | "small"
            | "specify"
            | "specparam"
            | "strong0"
            | "strong1"
            | "supply0"
            | "supply1"
            | "table"
            | "task"
            | "time"
            | "tran"
            | "tranif0"
            | "tranif1"
            | "tri"
            | "tri0"
            | "tri1"
            | "triand"
            | "trior"
            | "trireg"
            | "unsigned"
            | "use"
            | "vectored"
            | "wait"
            | "wand"
            | "weak0"
            | "weak1"
            | "while"
            | "wire"
            | "wor"
            | "xnor"
            | "xor"
    )
}

/// Turns an arbitrary hint into a legal simple identifier.
pub fn legalize(hint: &str) -> String {
    let mut name: String = hint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push('_');
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if is_keyword(&name) {
        name.push('_');
    }
    name
}

/// The set of identifiers already taken in one module.
#[derive(Debug, Default, Clone)]
pub struct NameScope {
    used: BTreeSet<String>,
}

impl NameScope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as taken without legalizing it.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    /// Returns `true` if `name` is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Claims a unique legal name derived from `hint`.
    pub fn claim(&mut self, hint: &str) -> String {
        let base = legalize(hint);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut i = 1usize;
        loop {
            let candidate = format!("{base}_{i}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            i += 1;
        }
    }
}

/// Final Verilog names of the design's signals.
#[derive(Debug, Default, Clone)]
pub struct SignalNames {
    names: BTreeMap<Signal, String>,
}

impl SignalNames {
    /// Names `signals` in order, each from its hint.
    ///
    /// A signal listed twice keeps its first name.
    pub fn assign<'a>(
        scope: &mut NameScope,
        signals: impl IntoIterator<Item = (&'a Signal, &'a str)>,
    ) -> Self {
        let mut names = BTreeMap::new();
        for (signal, hint) in signals {
            if !names.contains_key(signal) {
                let name = scope.claim(hint);
                names.insert(signal.clone(), name);
            }
        }
        Self { names }
    }

    /// The name of `signal`, falling back to its legalized own name.
    pub fn get<'a>(&'a self, signal: &'a Signal) -> &'a str {
        self.names
            .get(signal)
            .map(String::as_str)
            .unwrap_or_else(|| signal.name())
    }

    /// Returns `true` if `signal` was named.
    pub fn contains(&self, signal: &Signal) -> bool {
        self.names.contains_key(signal)
    }

    /// Consumes the table.
    pub fn into_map(self) -> BTreeMap<Signal, String> {
        self.names
    }
}
