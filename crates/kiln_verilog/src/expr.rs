//! Printing values as Verilog expressions.
//!
//! Verilog sizes most operands by their context, while kiln values carry
//! their own inferred shape. The printer bridges the two: mixed-signedness
//! operands get an explicit `$signed({1'd0, x})`, and any subexpression whose
//! width would be lost in a self-determined position (concatenation parts,
//! comparison and shift operands, conditions) is hoisted into a sized
//! temporary wire.

use crate::emit::Emitter;
use kiln_common::bits_for;
use kiln_ir::{BinaryOp, Const, UnaryOp, Value};
use num_bigint::{BigInt, Sign};

/// Renders a constant as a sized Verilog literal.
pub fn const_literal(c: &Const) -> String {
    let width = c.shape.width.max(1);
    if c.shape.signed {
        if c.value.sign() == Sign::Minus {
            format!("-{width}'sd{}", -&c.value)
        } else {
            format!("{width}'sd{}", c.value)
        }
    } else {
        format!("{width}'d{}", c.value)
    }
}

/// The declaration prefix for a value of `shape`, e.g. `signed [7:0] `.
pub fn shape_prefix(shape: kiln_ir::Shape) -> String {
    let mut out = String::new();
    if shape.signed {
        out.push_str("signed ");
    }
    if shape.width > 1 {
        out.push_str(&format!("[{}:0] ", shape.width - 1));
    }
    out
}

/// Unsigned subtraction wraps at its inferred width, which Verilog would
/// widen to the surrounding context.
fn is_wrapping_sub(value: &Value) -> bool {
    matches!(value, Value::Binary { op: BinaryOp::Sub, .. }) && !value.shape().signed
}

/// Returns `true` if printing `value` in a self-determined position could
/// drop bits its inferred shape keeps.
fn needs_hoist(value: &Value) -> bool {
    match value {
        Value::Binary {
            op: BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Shl,
            ..
        } => true,
        Value::Binary {
            op: BinaryOp::And | BinaryOp::Or | BinaryOp::Xor,
            lhs,
            rhs,
        } => needs_hoist(lhs) || needs_hoist(rhs),
        Value::Unary { operand, .. } => needs_hoist(operand),
        Value::Mux { choices, .. } => choices.iter().any(needs_hoist),
        _ => false,
    }
}

impl Emitter<'_> {
    /// Prints `value` where Verilog sizes it by context.
    pub(crate) fn expr(&mut self, value: &Value) -> String {
        if is_wrapping_sub(value) {
            return self.hoist(value);
        }
        self.print(value)
    }

    /// Prints `value` as the right-hand side of an assignment to a target
    /// `width` bits wide.
    pub(crate) fn assign_rhs(&mut self, value: &Value, width: u32) -> String {
        if is_wrapping_sub(value) && width <= value.shape().width {
            return self.print(value);
        }
        self.expr(value)
    }

    /// Prints `value` where Verilog sizes it by itself.
    pub(crate) fn operand(&mut self, value: &Value) -> String {
        if needs_hoist(value) {
            self.hoist(value)
        } else {
            self.expr(value)
        }
    }

    /// Moves `value` into a temporary wire of its inferred shape and returns
    /// the wire's name. Identical values share one temporary.
    pub(crate) fn hoist(&mut self, value: &Value) -> String {
        if let Some(name) = self.hoisted.get(value) {
            return name.clone();
        }
        let text = self.print(value);
        let name = self.scope.claim("_tmp");
        self.push_temp(name.clone(), value.shape(), text);
        self.hoisted.insert(value.clone(), name.clone());
        name
    }

    fn print(&mut self, value: &Value) -> String {
        match value {
            Value::Const(c) => const_literal(c),
            Value::Signal(s) => self.names.get(s).to_string(),
            // Resolved to signals before emission.
            Value::ClockSignal { .. } | Value::ResetSignal { .. } => "1'd0".to_string(),
            Value::Unary { op, operand } => self.unary(*op, operand),
            Value::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Value::Slice {
                value: inner,
                start,
                stop,
            } => {
                let base = match inner.as_ref() {
                    Value::Signal(s) => self.names.get(s).to_string(),
                    other => self.hoist(other),
                };
                let shape = inner.shape();
                let text = if shape.width == 1 {
                    base
                } else if stop - start == 1 {
                    format!("{base}[{start}]")
                } else {
                    format!("{base}[{}:{start}]", stop - 1)
                };
                if shape.signed {
                    format!("$signed({text})")
                } else {
                    text
                }
            }
            Value::Concat(parts) => {
                let texts: Vec<String> = parts.iter().rev().map(|p| self.operand(p)).collect();
                format!("{{{}}}", texts.join(", "))
            }
            Value::Replicate { value: inner, count } => {
                let text = self.operand(inner);
                format!("{{{count}{{{text}}}}}")
            }
            Value::Mux { selector, choices } => {
                self.mux(selector, choices, value.shape().signed)
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Value) -> String {
        let signed = operand.shape().signed;
        match (op, signed) {
            (UnaryOp::Invert, true) => format!("(~{})", self.expr(operand)),
            // Braces keep the inversion at the operand's own width.
            (UnaryOp::Invert, false) => format!("{{~{}}}", self.operand(operand)),
            (UnaryOp::Neg, true) => format!("(-{})", self.expr(operand)),
            (UnaryOp::Neg, false) => format!("(-$signed({{1'd0, {}}}))", self.operand(operand)),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> String {
        let (ls, rs) = (lhs.shape(), rhs.shape());
        if op.is_shift() {
            let symbol = match (op, ls.signed) {
                (BinaryOp::Shl, true) => "<<<",
                (BinaryOp::Shr, true) => ">>>",
                (BinaryOp::Shl, false) => "<<",
                _ => ">>",
            };
            let l = self.operand(lhs);
            let r = self.operand(rhs);
            return format!("({l} {symbol} {r})");
        }
        let symbol = op.symbol();
        if op.is_comparison() {
            let (l, r) = self.aligned(lhs, rhs, true);
            return format!("({l} {symbol} {r})");
        }
        let mixed = ls.signed != rs.signed;
        match op {
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor if mixed => {
                let (l, r) = self.aligned(lhs, rhs, true);
                format!("$unsigned({l} {symbol} {r})")
            }
            _ => {
                let (l, r) = self.aligned(lhs, rhs, false);
                format!("({l} {symbol} {r})")
            }
        }
    }

    /// Prints both operands, casting the unsigned one when the other is signed.
    fn aligned(&mut self, lhs: &Value, rhs: &Value, self_determined: bool) -> (String, String) {
        let (ls, rs) = (lhs.shape(), rhs.shape());
        let l = self.side(lhs, rs.signed && !ls.signed, self_determined);
        let r = self.side(rhs, ls.signed && !rs.signed, self_determined);
        (l, r)
    }

    fn side(&mut self, value: &Value, cast: bool, self_determined: bool) -> String {
        if cast {
            format!("$signed({{1'd0, {}}})", self.operand(value))
        } else if self_determined {
            self.operand(value)
        } else {
            self.expr(value)
        }
    }

    fn mux(&mut self, selector: &Value, choices: &[Value], signed: bool) -> String {
        let mut texts: Vec<String> = choices
            .iter()
            .map(|c| {
                if signed && !c.shape().signed {
                    format!("$signed({{1'd0, {}}})", self.operand(c))
                } else {
                    self.expr(c)
                }
            })
            .collect();
        let Some(mut out) = texts.pop() else {
            return "1'd0".to_string();
        };
        if texts.is_empty() {
            return out;
        }
        let sel_width = selector.shape().width;
        let sel = self.operand(selector);
        if texts.len() == 1 && sel_width == 1 {
            return format!("({sel} ? {out} : {})", texts[0]);
        }
        for (i, text) in texts.into_iter().enumerate().rev() {
            let width = sel_width.max(bits_for(&BigInt::from(i), false));
            out = format!("(({sel} == {width}'d{i}) ? {text} : {out})");
        }
        out
    }
}
