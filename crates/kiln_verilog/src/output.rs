//! The result of a conversion.

use kiln_common::ContentHash;
use kiln_diagnostics::Diagnostic;
use kiln_ir::{PortDirection, Signal};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A top-level port of the emitted module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    /// The signal behind the port.
    pub signal: Signal,
    /// Direction as seen from outside the module.
    pub direction: PortDirection,
}

impl Port {
    /// An input port.
    pub fn input(signal: Signal) -> Self {
        Self {
            signal,
            direction: PortDirection::Input,
        }
    }

    /// An output port.
    pub fn output(signal: Signal) -> Self {
        Self {
            signal,
            direction: PortDirection::Output,
        }
    }

    /// A bidirectional port.
    pub fn inout(signal: Signal) -> Self {
        Self {
            signal,
            direction: PortDirection::InOut,
        }
    }
}

/// An auxiliary file written next to the Verilog source, such as a memory
/// initialization image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFile {
    /// File name, relative to the output directory.
    pub name: String,
    /// File contents.
    pub contents: String,
}

/// Verilog source and everything needed to use it.
#[derive(Debug, Clone)]
pub struct ConvertOutput {
    /// Name of the emitted module.
    pub module_name: String,
    /// The module text.
    pub source: String,
    /// Files the source refers to.
    pub data_files: Vec<DataFile>,
    /// Final identifier of every signal in the module.
    pub names: BTreeMap<Signal, String>,
    /// Ports in declaration order.
    pub ports: Vec<Port>,
    /// Warnings that survived the lint policy.
    pub diagnostics: Vec<Diagnostic>,
    /// Fingerprint of the source and data files.
    pub hash: ContentHash,
}

impl ConvertOutput {
    pub(crate) fn new(
        module_name: String,
        source: String,
        data_files: Vec<DataFile>,
        names: BTreeMap<Signal, String>,
        ports: Vec<Port>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let mut parts: Vec<&[u8]> = vec![source.as_bytes()];
        for file in &data_files {
            parts.push(file.name.as_bytes());
            parts.push(file.contents.as_bytes());
        }
        let hash = ContentHash::from_parts(parts);
        Self {
            module_name,
            source,
            data_files,
            names,
            ports,
            diagnostics,
            hash,
        }
    }

    /// The Verilog identifier given to `signal`, if it appears in the module.
    pub fn name_of(&self, signal: &Signal) -> Option<&str> {
        self.names.get(signal).map(String::as_str)
    }

    /// Port identifiers in declaration order.
    pub fn port_names(&self) -> Vec<&str> {
        self.ports
            .iter()
            .filter_map(|p| self.name_of(&p.signal))
            .collect()
    }

    /// Writes `{module}.v` and every data file into `dir`, returning the
    /// path of the source file.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.v", self.module_name));
        std::fs::write(&path, &self.source)?;
        for file in &self.data_files {
            std::fs::write(dir.join(&file.name), &file.contents)?;
        }
        Ok(path)
    }
}

impl fmt::Display for ConvertOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ConvertOutput, Signal) {
        let a = Signal::new("a", 1);
        let mut names = BTreeMap::new();
        names.insert(a.clone(), "a".to_string());
        let out = ConvertOutput::new(
            "top".into(),
            "module top(input a);\nendmodule\n".into(),
            vec![DataFile {
                name: "mem.init".into(),
                contents: "00\n".into(),
            }],
            names,
            vec![Port::input(a.clone())],
            Vec::new(),
        );
        (out, a)
    }

    #[test]
    fn names_and_ports() {
        let (out, a) = sample();
        assert_eq!(out.name_of(&a), Some("a"));
        assert_eq!(out.port_names(), vec!["a"]);
        assert_eq!(out.to_string(), out.source);
    }

    #[test]
    fn hash_covers_data_files() {
        let (a, _) = sample();
        let mut b = a.clone();
        b.data_files[0].contents = "01\n".into();
        let b = ConvertOutput::new(b.module_name, b.source, b.data_files, b.names, b.ports, b.diagnostics);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn write_to_creates_files() {
        let (out, _) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = out.write_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "top.v");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), out.source);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mem.init")).unwrap(),
            "00\n"
        );
    }
}
