//! Width and signedness inference.
//!
//! [`infer`] is total over [`Value`] and depends only on the value's own
//! structure. The rules follow two's-complement hardware: results are sized
//! so that no carry or sign information is lost.

use crate::shape::Shape;
use crate::value::{BinaryOp, UnaryOp, Value};
use num_bigint::Sign;

/// Computes the shape every evaluation of `value` fits in.
pub fn infer(value: &Value) -> Shape {
    match value {
        Value::Const(c) => c.shape,
        Value::Signal(s) => s.shape(),
        Value::ClockSignal { .. } | Value::ResetSignal { .. } => Shape::unsigned(1),
        Value::Unary { op, operand } => {
            let s = infer(operand);
            match op {
                UnaryOp::Invert => s,
                UnaryOp::Neg if s.signed => s,
                UnaryOp::Neg => Shape::signed(s.width.saturating_add(1)),
            }
        }
        Value::Binary { op, lhs, rhs } => binary_shape(*op, infer(lhs), infer(rhs), rhs),
        Value::Slice {
            value, start, stop, ..
        } => Shape {
            width: stop.saturating_sub(*start),
            signed: infer(value).signed,
        },
        Value::Concat(parts) => Shape::unsigned(parts.iter().map(|p| infer(p).width).sum()),
        Value::Replicate { value, count } => {
            Shape::unsigned(infer(value).width.saturating_mul(*count))
        }
        Value::Mux { choices, .. } => {
            let shapes: Vec<Shape> = choices.iter().map(infer).collect();
            Shape {
                width: shapes.iter().map(|s| s.width).max().unwrap_or(0),
                signed: shapes.iter().any(|s| s.signed),
            }
        }
    }
}

/// Widths of two operands after aligning their signedness.
///
/// An unsigned operand facing a signed one needs one extra bit so that its
/// top bit is not mistaken for a sign bit.
pub fn promoted_widths(a: Shape, b: Shape) -> (u32, u32) {
    match (a.signed, b.signed) {
        (true, false) => (a.width, b.width.saturating_add(1)),
        (false, true) => (a.width.saturating_add(1), b.width),
        _ => (a.width, b.width),
    }
}

fn binary_shape(op: BinaryOp, a: Shape, b: Shape, rhs: &Value) -> Shape {
    match op {
        BinaryOp::Add | BinaryOp::Sub => {
            let (wa, wb) = promoted_widths(a, b);
            Shape {
                width: wa.max(wb).saturating_add(1),
                signed: a.signed || b.signed,
            }
        }
        BinaryOp::Mul => {
            let sum = a.width.saturating_add(b.width);
            match (a.signed, b.signed) {
                (false, false) => Shape::unsigned(sum),
                (true, true) => Shape::signed(sum.saturating_sub(1).max(1)),
                _ => Shape::signed(sum),
            }
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            let (wa, wb) = promoted_widths(a, b);
            Shape {
                width: wa.max(wb),
                signed: a.signed && b.signed,
            }
        }
        BinaryOp::Shl => {
            let extra = match rhs {
                // Negative amounts are rejected by `Value::check`; size them as 0.
                Value::Const(c) if c.value.sign() == Sign::Minus => 0,
                Value::Const(c) => u32::try_from(&c.value).unwrap_or(u32::MAX),
                _ if b.signed => pow2_saturating(b.width.saturating_sub(1)).saturating_sub(1),
                _ => pow2_saturating(b.width).saturating_sub(1),
            };
            Shape {
                width: a.width.saturating_add(extra),
                signed: a.signed,
            }
        }
        BinaryOp::Shr => {
            let extra = match rhs {
                Value::Const(_) => 0,
                _ if b.signed => pow2_saturating(b.width.saturating_sub(1)),
                _ => 0,
            };
            Shape {
                width: a.width.saturating_add(extra),
                signed: a.signed,
            }
        }
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => Shape::unsigned(1),
    }
}

fn pow2_saturating(n: u32) -> u32 {
    1u32.checked_shl(n).unwrap_or(u32::MAX)
}
