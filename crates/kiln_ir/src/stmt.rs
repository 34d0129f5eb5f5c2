//! Statements over values.
//!
//! [`Statement`] is what combinational and synchronous lists hold. The
//! [`If`] and [`Case`] builders assemble the conditional forms; `NextState`
//! and `NextValue` exist only inside FSM bodies and are rewritten into plain
//! assignments when the FSM is compiled.

use crate::error::{ElabError, ElabResult};
use crate::value::{Const, Value};
use num_bigint::BigInt;
use std::collections::BTreeSet;

/// One arm of a [`Statement::Case`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseArm {
    /// The value the test must equal.
    pub key: Const,
    /// Statements run when the arm matches.
    pub body: Vec<Statement>,
}

/// A statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// Drive `lhs` with `rhs`.
    Assign {
        /// Target.
        lhs: Value,
        /// Source.
        rhs: Value,
    },
    /// Two-way branch.
    If {
        /// Condition; true when any bit is set.
        cond: Value,
        /// Taken when the condition is true.
        then_body: Vec<Statement>,
        /// Taken otherwise.
        else_body: Vec<Statement>,
    },
    /// Multi-way branch on a value.
    Case {
        /// The value being matched.
        test: Value,
        /// Arms with distinct keys.
        arms: Vec<CaseArm>,
        /// Taken when no arm matches.
        default: Option<Vec<Statement>>,
    },
    /// FSM only: move to the named state on the next clock edge.
    NextState(String),
    /// FSM only: load `target` with `value` on the next clock edge.
    NextValue {
        /// The register.
        target: Value,
        /// Its next value.
        value: Value,
    },
}

impl Statement {
    /// An assignment.
    pub fn assign(lhs: impl Into<Value>, rhs: impl Into<Value>) -> Statement {
        Statement::Assign {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    /// A state transition, valid only inside an FSM state body.
    pub fn next_state(state: impl Into<String>) -> Statement {
        Statement::NextState(state.into())
    }

    /// A registered update, valid only inside an FSM state body.
    pub fn next_value(target: impl Into<Value>, value: impl Into<Value>) -> Statement {
        Statement::NextValue {
            target: target.into(),
            value: value.into(),
        }
    }

    /// Short name of the statement kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Assign { .. } => "Assign",
            Statement::If { .. } => "If",
            Statement::Case { .. } => "Case",
            Statement::NextState(_) => "NextState",
            Statement::NextValue { .. } => "NextValue",
        }
    }
}

/// Builder for `if / elif / else` chains.
#[derive(Clone, Debug)]
pub struct If {
    branches: Vec<(Value, Vec<Statement>)>,
    otherwise: Vec<Statement>,
}

impl If {
    /// Starts a chain with its first condition.
    pub fn new(cond: impl Into<Value>, body: impl IntoIterator<Item = Statement>) -> Self {
        Self {
            branches: vec![(cond.into(), body.into_iter().collect())],
            otherwise: Vec::new(),
        }
    }

    /// Adds an `elif` branch.
    pub fn elif(mut self, cond: impl Into<Value>, body: impl IntoIterator<Item = Statement>) -> Self {
        self.branches.push((cond.into(), body.into_iter().collect()));
        self
    }

    /// Sets the final `else` branch.
    pub fn otherwise(mut self, body: impl IntoIterator<Item = Statement>) -> Self {
        self.otherwise = body.into_iter().collect();
        self
    }
}

impl From<If> for Statement {
    fn from(chain: If) -> Statement {
        let mut else_body = chain.otherwise;
        for (cond, then_body) in chain.branches.into_iter().rev() {
            else_body = vec![Statement::If {
                cond,
                then_body,
                else_body,
            }];
        }
        // `If::new` always pushes one branch, so the fold yields exactly one statement.
        else_body.pop().unwrap_or(Statement::If {
            cond: Value::from(false),
            then_body: Vec::new(),
            else_body: Vec::new(),
        })
    }
}

/// Builder for `case` statements that rejects repeated keys.
#[derive(Clone, Debug)]
pub struct Case {
    test: Value,
    arms: Vec<CaseArm>,
    default: Option<Vec<Statement>>,
    seen: BTreeSet<BigInt>,
}

impl Case {
    /// Starts a case over `test`.
    pub fn new(test: impl Into<Value>) -> Self {
        Self {
            test: test.into(),
            arms: Vec::new(),
            default: None,
            seen: BTreeSet::new(),
        }
    }

    /// Adds an arm.
    ///
    /// Keys are compared after truncation to the test's shape, so `-1` and
    /// `15` collide on a 4-bit test.
    pub fn arm(
        mut self,
        key: impl Into<BigInt>,
        body: impl IntoIterator<Item = Statement>,
    ) -> ElabResult<Self> {
        let shape = self.test.shape();
        let key = Const::sized(key, shape);
        if !self.seen.insert(key.value.clone()) {
            return Err(ElabError::DuplicateCaseKey {
                key: key.value.to_string(),
            });
        }
        self.arms.push(CaseArm {
            key,
            body: body.into_iter().collect(),
        });
        Ok(self)
    }

    /// Sets the default arm.
    pub fn default(mut self, body: impl IntoIterator<Item = Statement>) -> Self {
        self.default = Some(body.into_iter().collect());
        self
    }
}

impl From<Case> for Statement {
    fn from(case: Case) -> Statement {
        Statement::Case {
            test: case.test,
            arms: case.arms,
            default: case.default,
        }
    }
}
