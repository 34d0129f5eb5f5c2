//! Traversal and rewriting of values and statement trees.
//!
//! Renaming, driver checking, FSM lowering, special lowering and code
//! generation are all expressed in terms of these few walkers.

use crate::signal::Signal;
use crate::stmt::{CaseArm, Statement};
use crate::value::Value;
use std::collections::BTreeSet;

/// Calls `f` on `value` and every node below it, parents first.
pub fn walk_value(value: &Value, f: &mut dyn FnMut(&Value)) {
    f(value);
    match value {
        Value::Const(_)
        | Value::Signal(_)
        | Value::ClockSignal { .. }
        | Value::ResetSignal { .. } => {}
        Value::Unary { operand, .. } => walk_value(operand, f),
        Value::Binary { lhs, rhs, .. } => {
            walk_value(lhs, f);
            walk_value(rhs, f);
        }
        Value::Slice { value, .. } | Value::Replicate { value, .. } => walk_value(value, f),
        Value::Concat(parts) => parts.iter().for_each(|p| walk_value(p, f)),
        Value::Mux { selector, choices } => {
            walk_value(selector, f);
            choices.iter().for_each(|c| walk_value(c, f));
        }
    }
}

/// Rebuilds `value`, replacing every node for which `f` returns `Some`.
///
/// Replaced nodes are not descended into.
pub fn rewrite_value(value: &Value, f: &mut dyn FnMut(&Value) -> Option<Value>) -> Value {
    if let Some(replaced) = f(value) {
        return replaced;
    }
    match value {
        Value::Const(_)
        | Value::Signal(_)
        | Value::ClockSignal { .. }
        | Value::ResetSignal { .. } => value.clone(),
        Value::Unary { op, operand } => Value::Unary {
            op: *op,
            operand: Box::new(rewrite_value(operand, f)),
        },
        Value::Binary { op, lhs, rhs } => Value::Binary {
            op: *op,
            lhs: Box::new(rewrite_value(lhs, f)),
            rhs: Box::new(rewrite_value(rhs, f)),
        },
        Value::Slice { value, start, stop } => Value::Slice {
            value: Box::new(rewrite_value(value, f)),
            start: *start,
            stop: *stop,
        },
        Value::Concat(parts) => Value::Concat(parts.iter().map(|p| rewrite_value(p, f)).collect()),
        Value::Replicate { value, count } => Value::Replicate {
            value: Box::new(rewrite_value(value, f)),
            count: *count,
        },
        Value::Mux { selector, choices } => Value::Mux {
            selector: Box::new(rewrite_value(selector, f)),
            choices: choices.iter().map(|c| rewrite_value(c, f)).collect(),
        },
    }
}

/// Replacement function renaming clock/reset references from `old` to `new`.
pub fn rename_domain_ref(value: &Value, old: &str, new: &str) -> Option<Value> {
    match value {
        Value::ClockSignal { domain } if domain == old => Some(Value::ClockSignal {
            domain: new.to_string(),
        }),
        Value::ResetSignal {
            domain,
            allow_reset_less,
        } if domain == old => Some(Value::ResetSignal {
            domain: new.to_string(),
            allow_reset_less: *allow_reset_less,
        }),
        _ => None,
    }
}

/// Calls `f` on every top-level value in `stmts`, including nested bodies.
pub fn for_each_value(stmts: &[Statement], f: &mut dyn FnMut(&Value)) {
    for st in stmts {
        match st {
            Statement::Assign { lhs, rhs } => {
                f(lhs);
                f(rhs);
            }
            Statement::If {
                cond,
                then_body,
                else_body,
            } => {
                f(cond);
                for_each_value(then_body, f);
                for_each_value(else_body, f);
            }
            Statement::Case {
                test,
                arms,
                default,
            } => {
                f(test);
                for arm in arms {
                    for_each_value(&arm.body, f);
                }
                if let Some(d) = default {
                    for_each_value(d, f);
                }
            }
            Statement::NextState(_) => {}
            Statement::NextValue { target, value } => {
                f(target);
                f(value);
            }
        }
    }
}

/// Rewrites every value in `stmts` with [`rewrite_value`].
pub fn rewrite_statements(
    stmts: &[Statement],
    f: &mut dyn FnMut(&Value) -> Option<Value>,
) -> Vec<Statement> {
    stmts
        .iter()
        .map(|st| match st {
            Statement::Assign { lhs, rhs } => Statement::Assign {
                lhs: rewrite_value(lhs, f),
                rhs: rewrite_value(rhs, f),
            },
            Statement::If {
                cond,
                then_body,
                else_body,
            } => Statement::If {
                cond: rewrite_value(cond, f),
                then_body: rewrite_statements(then_body, f),
                else_body: rewrite_statements(else_body, f),
            },
            Statement::Case {
                test,
                arms,
                default,
            } => Statement::Case {
                test: rewrite_value(test, f),
                arms: arms
                    .iter()
                    .map(|arm| CaseArm {
                        key: arm.key.clone(),
                        body: rewrite_statements(&arm.body, f),
                    })
                    .collect(),
                default: default.as_ref().map(|d| rewrite_statements(d, f)),
            },
            Statement::NextState(s) => Statement::NextState(s.clone()),
            Statement::NextValue { target, value } => Statement::NextValue {
                target: rewrite_value(target, f),
                value: rewrite_value(value, f),
            },
        })
        .collect()
}

/// Rewrites statements bottom-up: bodies of `If`/`Case` are rewritten first,
/// then `f` may replace the statement with any number of statements.
pub fn transform_statements<E>(
    stmts: &[Statement],
    f: &mut dyn FnMut(Statement) -> Result<Vec<Statement>, E>,
) -> Result<Vec<Statement>, E> {
    let mut out = Vec::with_capacity(stmts.len());
    for st in stmts {
        let rebuilt = match st {
            Statement::If {
                cond,
                then_body,
                else_body,
            } => Statement::If {
                cond: cond.clone(),
                then_body: transform_statements(then_body, f)?,
                else_body: transform_statements(else_body, f)?,
            },
            Statement::Case {
                test,
                arms,
                default,
            } => {
                let mut new_arms = Vec::with_capacity(arms.len());
                for arm in arms {
                    new_arms.push(CaseArm {
                        key: arm.key.clone(),
                        body: transform_statements(&arm.body, f)?,
                    });
                }
                Statement::Case {
                    test: test.clone(),
                    arms: new_arms,
                    default: match default {
                        Some(d) => Some(transform_statements(d, f)?),
                        None => None,
                    },
                }
            }
            other => other.clone(),
        };
        out.extend(f(rebuilt)?);
    }
    Ok(out)
}

/// Calls `f` on the left-hand side of every assignment in `stmts`,
/// including `NextValue` targets.
pub fn for_each_target(stmts: &[Statement], f: &mut dyn FnMut(&Value)) {
    for st in stmts {
        match st {
            Statement::Assign { lhs, .. } => f(lhs),
            Statement::NextValue { target, .. } => f(target),
            Statement::If {
                then_body,
                else_body,
                ..
            } => {
                for_each_target(then_body, f);
                for_each_target(else_body, f);
            }
            Statement::Case { arms, default, .. } => {
                for arm in arms {
                    for_each_target(&arm.body, f);
                }
                if let Some(d) = default {
                    for_each_target(d, f);
                }
            }
            Statement::NextState(_) => {}
        }
    }
}

/// Returns `true` if `value` can appear on the left of an assignment.
pub fn is_valid_target(value: &Value) -> bool {
    match value {
        Value::Signal(_) | Value::ResetSignal { .. } => true,
        Value::Slice { value, .. } => is_valid_target(value),
        Value::Concat(parts) => !parts.is_empty() && parts.iter().all(is_valid_target),
        Value::Mux { choices, .. } => !choices.is_empty() && choices.iter().all(is_valid_target),
        _ => false,
    }
}

/// Signals driven by an assignment to `target`.
///
/// The selector of a `Mux` target is read, not driven, and is excluded.
pub fn target_signals(target: &Value, out: &mut BTreeSet<Signal>) {
    match target {
        Value::Signal(s) => {
            out.insert(s.clone());
        }
        Value::Slice { value, .. } => target_signals(value, out),
        Value::Concat(parts) => parts.iter().for_each(|p| target_signals(p, out)),
        Value::Mux { choices, .. } => choices.iter().for_each(|c| target_signals(c, out)),
        _ => {}
    }
}

/// Signals read when assigning to `target`, i.e. `Mux` selectors.
fn target_reads(target: &Value, out: &mut BTreeSet<Signal>) {
    match target {
        Value::Slice { value, .. } => target_reads(value, out),
        Value::Concat(parts) => parts.iter().for_each(|p| target_reads(p, out)),
        Value::Mux { selector, choices } => {
            signals_in(selector, out);
            choices.iter().for_each(|c| target_reads(c, out));
        }
        _ => {}
    }
}

/// Every signal appearing anywhere in `value`.
pub fn signals_in(value: &Value, out: &mut BTreeSet<Signal>) {
    walk_value(value, &mut |v| {
        if let Value::Signal(s) = v {
            out.insert(s.clone());
        }
    });
}

/// Signals assigned by `stmts`, including `NextValue` targets.
pub fn assigned_signals(stmts: &[Statement]) -> BTreeSet<Signal> {
    let mut out = BTreeSet::new();
    collect_assigned(stmts, &mut out);
    out
}

fn collect_assigned(stmts: &[Statement], out: &mut BTreeSet<Signal>) {
    for st in stmts {
        match st {
            Statement::Assign { lhs, .. } => target_signals(lhs, out),
            Statement::NextValue { target, .. } => target_signals(target, out),
            Statement::If {
                then_body,
                else_body,
                ..
            } => {
                collect_assigned(then_body, out);
                collect_assigned(else_body, out);
            }
            Statement::Case { arms, default, .. } => {
                for arm in arms {
                    collect_assigned(&arm.body, out);
                }
                if let Some(d) = default {
                    collect_assigned(d, out);
                }
            }
            Statement::NextState(_) => {}
        }
    }
}

/// Signals read by `stmts`: right-hand sides, conditions, case tests and
/// selectors of `Mux` targets.
pub fn read_signals(stmts: &[Statement]) -> BTreeSet<Signal> {
    let mut out = BTreeSet::new();
    collect_read(stmts, &mut out);
    out
}

fn collect_read(stmts: &[Statement], out: &mut BTreeSet<Signal>) {
    for st in stmts {
        match st {
            Statement::Assign { lhs, rhs } => {
                target_reads(lhs, out);
                signals_in(rhs, out);
            }
            Statement::NextValue { target, value } => {
                target_reads(target, out);
                signals_in(value, out);
            }
            Statement::If {
                cond,
                then_body,
                else_body,
            } => {
                signals_in(cond, out);
                collect_read(then_body, out);
                collect_read(else_body, out);
            }
            Statement::Case {
                test,
                arms,
                default,
            } => {
                signals_in(test, out);
                for arm in arms {
                    collect_read(&arm.body, out);
                }
                if let Some(d) = default {
                    collect_read(d, out);
                }
            }
            Statement::NextState(_) => {}
        }
    }
}

/// Finds the first `NextState`/`NextValue` in `stmts`.
pub fn find_fsm_sugar(stmts: &[Statement]) -> Option<&Statement> {
    for st in stmts {
        match st {
            Statement::NextState(_) | Statement::NextValue { .. } => return Some(st),
            Statement::If {
                then_body,
                else_body,
                ..
            } => {
                if let Some(found) = find_fsm_sugar(then_body).or_else(|| find_fsm_sugar(else_body))
                {
                    return Some(found);
                }
            }
            Statement::Case { arms, default, .. } => {
                for arm in arms {
                    if let Some(found) = find_fsm_sugar(&arm.body) {
                        return Some(found);
                    }
                }
                if let Some(found) = default.as_deref().and_then(find_fsm_sugar) {
                    return Some(found);
                }
            }
            Statement::Assign { .. } => {}
        }
    }
    None
}
