//! Folding combinational statements into one expression per signal.
//!
//! Combinational logic is emitted as continuous assignments, so the
//! statement list is executed symbolically: every signal starts at its reset
//! value, assignments replace (or splice into) the current expression, and
//! the two sides of an `If` or the arms of a `Case` are merged with muxes.
//! The last assignment on any path wins, exactly as in a procedural block.

use kiln_common::to_bits;
use kiln_ir::{mux, Const, Shape, Signal, Statement, Value, ValueOps};
use std::collections::{BTreeMap, BTreeSet};

type Env = BTreeMap<Signal, Value>;

/// Computes the final expression of every signal `stmts` assign.
pub fn fold_comb(stmts: &[Statement]) -> BTreeMap<Signal, Value> {
    let mut env = Env::new();
    exec(stmts, &mut env);
    env
}

/// The reset value of `signal` as a sized constant.
pub fn reset_value(signal: &Signal) -> Value {
    Value::Const(Const::sized(signal.reset().clone(), signal.shape()))
}

fn current(env: &Env, signal: &Signal) -> Value {
    env.get(signal)
        .cloned()
        .unwrap_or_else(|| reset_value(signal))
}

fn exec(stmts: &[Statement], env: &mut Env) {
    for st in stmts {
        match st {
            Statement::Assign { lhs, rhs } => assign(env, lhs, rhs.clone()),
            Statement::If {
                cond,
                then_body,
                else_body,
            } => {
                let mut taken = env.clone();
                exec(then_body, &mut taken);
                let mut not_taken = env.clone();
                exec(else_body, &mut not_taken);
                *env = merge(cond, taken, not_taken);
            }
            Statement::Case {
                test,
                arms,
                default,
            } => {
                let mut acc = env.clone();
                if let Some(body) = default {
                    exec(body, &mut acc);
                }
                for arm in arms.iter().rev() {
                    let mut taken = env.clone();
                    exec(&arm.body, &mut taken);
                    let hit = test.cmp_eq(Value::Const(arm.key.clone()));
                    acc = merge(&hit, taken, acc);
                }
                *env = acc;
            }
            // Rejected before emission.
            Statement::NextState(_) | Statement::NextValue { .. } => {}
        }
    }
}

fn merge(cond: &Value, then: Env, otherwise: Env) -> Env {
    let keys: BTreeSet<Signal> = then.keys().chain(otherwise.keys()).cloned().collect();
    keys.into_iter()
        .map(|signal| {
            let t = current(&then, &signal);
            let e = current(&otherwise, &signal);
            let value = if t == e { t } else { mux(cond.clone(), t, e) };
            (signal, value)
        })
        .collect()
}

fn assign(env: &mut Env, target: &Value, rhs: Value) {
    match target {
        Value::Signal(s) => {
            env.insert(s.clone(), rhs);
        }
        Value::Slice { value, start, stop } => {
            let cur = eval_target(env, value);
            let width = cur.shape().width;
            let mut parts = Vec::with_capacity(3);
            if *start > 0 {
                parts.push(slice(cur.clone(), 0, *start));
            }
            parts.push(fit(rhs, stop - start));
            if *stop < width {
                parts.push(slice(cur, *stop, width));
            }
            let spliced = if parts.len() == 1 {
                parts.remove(0)
            } else {
                Value::Concat(parts)
            };
            assign(env, value, spliced);
        }
        Value::Concat(parts) => {
            let total = parts.iter().map(|p| p.shape().width).sum();
            let rhs = fit(rhs, total);
            let mut lo = 0;
            for part in parts {
                let w = part.shape().width;
                assign(env, part, slice(rhs.clone(), lo, lo + w));
                lo += w;
            }
        }
        Value::Mux { selector, choices } => {
            if let [only] = choices.as_slice() {
                assign(env, only, rhs);
                return;
            }
            let last = choices.len().saturating_sub(1);
            for (i, choice) in choices.iter().enumerate() {
                let selected = if i == last {
                    selector.as_ref().cmp_ge(i)
                } else {
                    selector.as_ref().cmp_eq(i)
                };
                let before = env.clone();
                let mut taken = env.clone();
                assign(&mut taken, choice, rhs.clone());
                *env = merge(&selected, taken, before);
            }
        }
        // Domain references are resolved to signals before folding.
        _ => {}
    }
}

/// The current value of an assignment target, with signals replaced by
/// what has been assigned to them so far.
fn eval_target(env: &Env, target: &Value) -> Value {
    match target {
        Value::Signal(s) => current(env, s),
        Value::Slice { value, start, stop } => slice(eval_target(env, value), *start, *stop),
        Value::Concat(parts) => Value::Concat(parts.iter().map(|p| eval_target(env, p)).collect()),
        Value::Mux { selector, choices } => Value::Mux {
            selector: selector.clone(),
            choices: choices.iter().map(|c| eval_target(env, c)).collect(),
        },
        other => other.clone(),
    }
}

/// Bits `start..stop` of `value`, simplified where the result is obvious.
///
/// Slices of constants fold, slices of slices collapse and slices of
/// concatenations pick out the covered parts. The range must lie within the
/// value.
pub fn slice(value: Value, start: u32, stop: u32) -> Value {
    let shape = value.shape();
    if start == 0 && stop == shape.width {
        return value;
    }
    match value {
        Value::Const(c) => {
            let bits = to_bits(&c.value, c.shape.width) >> start as usize;
            Value::Const(Const::sized(
                bits,
                Shape {
                    width: stop - start,
                    signed: c.shape.signed,
                },
            ))
        }
        Value::Slice {
            value: inner,
            start: base,
            ..
        } => Value::Slice {
            value: inner,
            start: base + start,
            stop: base + stop,
        },
        Value::Concat(parts) => {
            let mut picked = Vec::new();
            let mut lo = 0;
            for part in parts {
                let w = part.shape().width;
                let hi = lo + w;
                if hi > start && lo < stop {
                    picked.push(slice(part, start.max(lo) - lo, stop.min(hi) - lo));
                }
                lo = hi;
            }
            if picked.len() == 1 {
                picked.remove(0)
            } else {
                Value::Concat(picked)
            }
        }
        other => Value::Slice {
            value: Box::new(other),
            start,
            stop,
        },
    }
}

/// `value` truncated or extended to exactly `width` bits.
///
/// Signed values are sign-extended, unsigned ones zero-extended.
pub fn fit(value: Value, width: u32) -> Value {
    let shape = value.shape();
    if shape.width == width {
        return value;
    }
    if let Value::Const(c) = &value {
        return Value::Const(Const::sized(c.value.clone(), Shape::unsigned(width)));
    }
    if shape.width > width {
        return slice(value, 0, width);
    }
    let pad = width - shape.width;
    let extension = if shape.signed {
        Value::Replicate {
            value: Box::new(slice(value.clone(), shape.width - 1, shape.width)),
            count: pad,
        }
    } else {
        Value::sized(0, pad)
    };
    Value::Concat(vec![value, extension])
}
