//! Expression evaluation and statement execution.
//!
//! Values are plain [`BigInt`]s holding the number a value denotes under its
//! inferred shape: unsigned values lie in `[0, 2^w)`, signed ones in
//! `[-2^(w-1), 2^(w-1))`. Every operator computes exactly and then wraps to
//! the result shape, which is what the inference rules promise hardware does.

use crate::error::SimError;
use kiln_common::{mask, to_bits, wrap};
use kiln_ir::{BinaryOp, Signal, Statement, UnaryOp, Value};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::collections::BTreeMap;

/// Current value of every signal, wrapped to its shape.
pub type State = BTreeMap<Signal, BigInt>;

/// The reset value of `signal`, wrapped to its shape.
pub fn reset_of(signal: &Signal) -> BigInt {
    wrap(signal.reset(), signal.width(), signal.is_signed())
}

/// Reads from committed state and collects writes.
///
/// In blocking mode reads see earlier writes of the same frame, as in a
/// combinational process. Otherwise reads only see `state`, as in a clocked
/// process with non-blocking assignments.
#[derive(Debug)]
pub struct Frame<'a> {
    state: &'a State,
    /// Values written by the executed statements.
    pub writes: BTreeMap<Signal, BigInt>,
    blocking: bool,
}

impl<'a> Frame<'a> {
    /// A frame with blocking (combinational) semantics.
    pub fn blocking(state: &'a State) -> Self {
        Self {
            state,
            writes: BTreeMap::new(),
            blocking: true,
        }
    }

    /// A frame with non-blocking (clocked) semantics.
    pub fn clocked(state: &'a State) -> Self {
        Self {
            state,
            writes: BTreeMap::new(),
            blocking: false,
        }
    }

    fn read(&self, signal: &Signal) -> BigInt {
        let written = if self.blocking {
            self.writes.get(signal)
        } else {
            None
        };
        written
            .or_else(|| self.state.get(signal))
            .cloned()
            .unwrap_or_else(|| reset_of(signal))
    }

    /// The value a target would read back, preferring pending writes.
    fn read_target(&self, signal: &Signal) -> BigInt {
        self.writes
            .get(signal)
            .or_else(|| self.state.get(signal))
            .cloned()
            .unwrap_or_else(|| reset_of(signal))
    }

    /// Evaluates `value`.
    pub fn eval(&self, value: &Value) -> Result<BigInt, SimError> {
        let shape = value.shape();
        let raw = match value {
            Value::Const(c) => c.value.clone(),
            Value::Signal(s) => return Ok(self.read(s)),
            Value::ClockSignal { domain } | Value::ResetSignal { domain, .. } => {
                return Err(SimError::Unsupported {
                    reason: format!("unresolved reference to domain `{domain}`"),
                })
            }
            Value::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Invert => -v - 1,
                    UnaryOp::Neg => -v,
                }
            }
            Value::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, l, r, lhs.shape().width, shape.width)
            }
            Value::Slice {
                value: inner,
                start,
                stop,
            } => {
                let bits = to_bits(&self.eval(inner)?, inner.shape().width);
                (bits >> *start as usize) & mask(stop - start)
            }
            Value::Concat(parts) => {
                let mut acc = BigInt::zero();
                let mut lo = 0usize;
                for part in parts {
                    let w = part.shape().width;
                    acc |= to_bits(&self.eval(part)?, w) << lo;
                    lo += w as usize;
                }
                acc
            }
            Value::Replicate { value: inner, count } => {
                let w = inner.shape().width;
                let bits = to_bits(&self.eval(inner)?, w);
                let mut acc = BigInt::zero();
                for i in 0..*count {
                    acc |= &bits << (i as usize * w as usize);
                }
                acc
            }
            Value::Mux { selector, choices } => {
                let sel = self.eval(selector)?;
                match choices.get(index(&sel, choices.len())) {
                    Some(choice) => self.eval(choice)?,
                    None => BigInt::zero(),
                }
            }
        };
        Ok(wrap(&raw, shape.width, shape.signed))
    }

    /// Executes `stmts`.
    pub fn exec(&mut self, stmts: &[Statement]) -> Result<(), SimError> {
        for st in stmts {
            match st {
                Statement::Assign { lhs, rhs } => {
                    let v = self.eval(rhs)?;
                    self.write(lhs, v)?;
                }
                Statement::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    if self.eval(cond)?.is_zero() {
                        self.exec(else_body)?;
                    } else {
                        self.exec(then_body)?;
                    }
                }
                Statement::Case {
                    test,
                    arms,
                    default,
                } => {
                    let shape = test.shape();
                    let v = self.eval(test)?;
                    let hit = arms
                        .iter()
                        .find(|arm| wrap(&arm.key.value, shape.width, shape.signed) == v);
                    match (hit, default) {
                        (Some(arm), _) => self.exec(&arm.body)?,
                        (None, Some(body)) => self.exec(body)?,
                        (None, None) => {}
                    }
                }
                Statement::NextState(_) | Statement::NextValue { .. } => {
                    return Err(SimError::Unsupported {
                        reason: format!("`{}` outside of an FSM", st.kind_name()),
                    })
                }
            }
        }
        Ok(())
    }

    /// Stores `value` into an assignment target.
    fn write(&mut self, target: &Value, value: BigInt) -> Result<(), SimError> {
        match target {
            Value::Signal(s) => {
                let v = wrap(&value, s.width(), s.is_signed());
                self.writes.insert(s.clone(), v);
            }
            Value::Slice {
                value: inner,
                start,
                stop,
            } => {
                let width = inner.shape().width;
                let old = to_bits(&self.current(inner)?, width);
                let field = mask(stop - start) << *start as usize;
                let cleared = old & (mask(width) ^ &field);
                let inserted = (to_bits(&value, stop - start) << *start as usize) & field;
                self.write(inner, cleared | inserted)?;
            }
            Value::Concat(parts) => {
                let total = parts.iter().map(|p| p.shape().width).sum();
                let bits = to_bits(&value, total);
                let mut lo = 0usize;
                for part in parts {
                    let w = part.shape().width;
                    self.write(part, (&bits >> lo) & mask(w))?;
                    lo += w as usize;
                }
            }
            Value::Mux { selector, choices } => {
                let sel = self.eval(selector)?;
                if let Some(choice) = choices.get(index(&sel, choices.len())) {
                    self.write(choice, value)?;
                }
            }
            other => {
                return Err(SimError::Unsupported {
                    reason: format!("assignment to `{other}`"),
                })
            }
        }
        Ok(())
    }

    /// The value of a target expression, seeing pending writes.
    fn current(&self, target: &Value) -> Result<BigInt, SimError> {
        match target {
            Value::Signal(s) => Ok(self.read_target(s)),
            Value::Slice {
                value: inner,
                start,
                stop,
            } => {
                let bits = to_bits(&self.current(inner)?, inner.shape().width);
                let shape = target.shape();
                Ok(wrap(
                    &((bits >> *start as usize) & mask(stop - start)),
                    shape.width,
                    shape.signed,
                ))
            }
            Value::Concat(parts) => {
                let mut acc = BigInt::zero();
                let mut lo = 0usize;
                for part in parts {
                    let w = part.shape().width;
                    acc |= to_bits(&self.current(part)?, w) << lo;
                    lo += w as usize;
                }
                Ok(acc)
            }
            Value::Mux { selector, choices } => {
                let sel = self.eval(selector)?;
                match choices.get(index(&sel, choices.len())) {
                    Some(choice) => self.current(choice),
                    None => Ok(BigInt::zero()),
                }
            }
            other => self.eval(other),
        }
    }
}

/// The choice a selector picks: out of range selects the last one.
fn index(sel: &BigInt, len: usize) -> usize {
    let last = len.saturating_sub(1);
    sel.to_usize().map_or(last, |i| i.min(last))
}

fn binary(op: BinaryOp, l: BigInt, r: BigInt, lhs_width: u32, width: u32) -> BigInt {
    let flag = |b: bool| BigInt::from(u8::from(b));
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::And => to_bits(&l, width) & to_bits(&r, width),
        BinaryOp::Or => to_bits(&l, width) | to_bits(&r, width),
        BinaryOp::Xor => to_bits(&l, width) ^ to_bits(&r, width),
        BinaryOp::Shl => match r.to_usize() {
            Some(n) if n <= width as usize => l << n,
            _ => BigInt::zero(),
        },
        BinaryOp::Shr => match r.to_usize() {
            Some(n) if n < lhs_width as usize => l >> n,
            _ if l.sign() == num_bigint::Sign::Minus => BigInt::from(-1),
            _ => BigInt::zero(),
        },
        BinaryOp::Eq => flag(l == r),
        BinaryOp::Ne => flag(l != r),
        BinaryOp::Lt => flag(l < r),
        BinaryOp::Le => flag(l <= r),
        BinaryOp::Gt => flag(l > r),
        BinaryOp::Ge => flag(l >= r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::{array, cat, If, Shape, ValueOps};

    fn eval(value: &Value, state: &State) -> BigInt {
        Frame::blocking(state).eval(value).unwrap()
    }

    fn state(pairs: &[(&Signal, i64)]) -> State {
        pairs
            .iter()
            .map(|(s, v)| ((*s).clone(), BigInt::from(*v)))
            .collect()
    }

    #[test]
    fn arithmetic_wraps_to_inferred_shape() {
        let a = Signal::new("a", 4);
        let b = Signal::new("b", 4);
        let st = state(&[(&a, 15), (&b, 1)]);
        assert_eq!(eval(&(&a + &b), &st), BigInt::from(16));
        assert_eq!(eval(&(&b - &a), &st), BigInt::from(18));
        assert_eq!(eval(&(&a * &b), &st), BigInt::from(15));
    }

    #[test]
    fn signed_and_mixed_comparisons() {
        let s = Signal::new("s", Shape::signed(4));
        let u = Signal::new("u", 4);
        let st = state(&[(&s, -1), (&u, 3)]);
        assert_eq!(eval(&s.clone().cmp_lt(&u), &st), BigInt::from(1));
        assert_eq!(eval(&(-&u), &st), BigInt::from(-3));
        assert_eq!(eval(&(!&u), &st), BigInt::from(12));
        assert_eq!(eval(&(&s >> 1), &st), BigInt::from(-1));
    }

    #[test]
    fn slices_concats_and_muxes() {
        let a = Signal::new("a", 8);
        let sel = Signal::new("sel", 2);
        let st = state(&[(&a, 0xa5), (&sel, 3)]);
        assert_eq!(eval(&a.clone().slice(4, 8).unwrap(), &st), BigInt::from(0xa));
        assert_eq!(
            eval(&cat([Value::sized(1, 4), Value::sized(2, 4)]), &st),
            BigInt::from(0x21)
        );
        let arr = array(&sel, [Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(eval(&arr, &st), BigInt::from(2));
        assert_eq!(eval(&Value::sized(1, 2).replicate(3).unwrap(), &st), BigInt::from(0b010101));
    }

    #[test]
    fn blocking_reads_see_earlier_writes() {
        let x = Signal::new("x", 4);
        let y = Signal::new("y", 4);
        let st = State::new();
        let mut frame = Frame::blocking(&st);
        frame
            .exec(&[x.clone().assign(3), y.clone().assign(&x + 1)])
            .unwrap();
        assert_eq!(frame.writes[&y], BigInt::from(4));
    }

    #[test]
    fn clocked_reads_see_old_values() {
        let x = Signal::new("x", 4);
        let y = Signal::new("y", 4);
        let st = state(&[(&x, 1), (&y, 2)]);
        let mut frame = Frame::clocked(&st);
        frame
            .exec(&[x.clone().assign(&y), y.clone().assign(&x)])
            .unwrap();
        assert_eq!(frame.writes[&x], BigInt::from(2));
        assert_eq!(frame.writes[&y], BigInt::from(1));
    }

    #[test]
    fn partial_writes_merge() {
        let x = Signal::new("x", 8).with_reset(0xff);
        let st = State::new();
        let mut frame = Frame::clocked(&st);
        frame
            .exec(&[
                x.clone().slice(0, 4).unwrap().assign(0),
                x.clone().slice(6, 8).unwrap().assign(1),
            ])
            .unwrap();
        assert_eq!(frame.writes[&x], BigInt::from(0b0111_0000));
    }

    #[test]
    fn if_and_case() {
        let c = Signal::new("c", 2);
        let x = Signal::new("x", 4);
        let st = state(&[(&c, 1)]);
        let stmt: Statement = kiln_ir::Case::new(&c)
            .arm(0, [x.clone().assign(5)])
            .unwrap()
            .arm(1, [If::new(c.clone().cmp_eq(1), [x.clone().assign(7)]).into()])
            .unwrap()
            .into();
        let mut frame = Frame::blocking(&st);
        frame.exec(&[stmt]).unwrap();
        assert_eq!(frame.writes[&x], BigInt::from(7));
    }

    #[test]
    fn fsm_sugar_is_rejected() {
        let st = State::new();
        let err = Frame::blocking(&st)
            .exec(&[Statement::NextState("A".into())])
            .unwrap_err();
        assert!(matches!(err, SimError::Unsupported { .. }));
    }
}
