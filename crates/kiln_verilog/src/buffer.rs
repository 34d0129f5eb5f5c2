//! Indentation-aware text buffer for emitted Verilog.

use std::fmt::{self, Write};

const TAB: &str = "\t";

/// Accumulates source text with a current indentation level.
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    out: String,
    tab: u8,
}

impl Buffer {
    /// An empty buffer at indentation level 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increases indentation by one level.
    pub fn push_tab(&mut self) {
        self.tab = self.tab.saturating_add(1);
    }

    /// Decreases indentation by one level.
    pub fn pop_tab(&mut self) {
        self.tab = self.tab.saturating_sub(1);
    }

    /// Writes the current indentation.
    pub fn write_tab(&mut self) {
        for _ in 0..self.tab {
            self.out.push_str(TAB);
        }
    }

    /// Writes `s` without indentation or newline.
    pub fn write_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Writes a newline.
    pub fn write_eol(&mut self) {
        self.out.push('\n');
    }

    /// Writes one indented line.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        self.write_tab();
        // Formatting into a `String` cannot fail.
        let _ = self.out.write_fmt(args);
        self.write_eol();
    }

    /// Consumes the buffer, returning its text.
    pub fn into_string(self) -> String {
        self.out
    }
}
