//! Immutable expression trees over signals and constants.
//!
//! [`Value`] is a closed sum type. Every operation on it builds a new node;
//! nothing is ever mutated in place, so a value can be shared freely between
//! statements. Operators from `std::ops` are overloaded on [`Value`] and
//! [`Signal`] so designs read like ordinary arithmetic; comparisons use the
//! `cmp_*` combinators on [`ValueOps`] because `PartialEq` is reserved for
//! structural equality.

use crate::error::{ElabError, ElabResult};
use crate::infer::infer;
use crate::shape::Shape;
use crate::signal::Signal;
use crate::stmt::Statement;
use kiln_common::wrap;
use num_bigint::BigInt;
use std::fmt;

/// A literal with an explicit shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Const {
    /// The value, already wrapped into `shape`.
    pub value: BigInt,
    /// Width and signedness.
    pub shape: Shape,
}

impl Const {
    /// A constant in its minimum two's-complement representation.
    ///
    /// Negative values are signed.
    pub fn new(value: impl Into<BigInt>) -> Self {
        let value = value.into();
        Self {
            shape: Shape::for_value(&value),
            value,
        }
    }

    /// A constant truncated to `shape`.
    pub fn sized(value: impl Into<BigInt>, shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        Self {
            value: wrap(&value.into(), shape.width, shape.signed),
            shape,
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Bitwise inversion (`~`).
    Invert,
    /// Arithmetic negation (`-`).
    Neg,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise XOR.
    Xor,
    /// Shift left.
    Shl,
    /// Shift right, arithmetic when the left operand is signed.
    Shr,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl BinaryOp {
    /// Returns `true` for the six comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Returns `true` for shifts.
    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    /// The operator's symbol in expression syntax.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// A hardware value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// A literal.
    Const(Const),
    /// A named wire or register.
    Signal(Signal),
    /// The clock of a domain, resolved during conversion.
    ClockSignal {
        /// Domain name.
        domain: String,
    },
    /// The reset of a domain, resolved during conversion.
    ResetSignal {
        /// Domain name.
        domain: String,
        /// Resolve to constant 0 instead of failing when the domain has no reset.
        allow_reset_less: bool,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Value>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Value>,
        /// Right operand.
        rhs: Box<Value>,
    },
    /// Bits `start..stop` of a value.
    Slice {
        /// The sliced value.
        value: Box<Value>,
        /// First bit (inclusive).
        start: u32,
        /// Last bit (exclusive).
        stop: u32,
    },
    /// Concatenation; the first part is least significant.
    Concat(Vec<Value>),
    /// `count` copies of a value side by side.
    Replicate {
        /// The repeated value.
        value: Box<Value>,
        /// Number of copies.
        count: u32,
    },
    /// Selects `choices[selector]`; out-of-range selectors pick the last choice.
    Mux {
        /// The index.
        selector: Box<Value>,
        /// The candidates.
        choices: Vec<Value>,
    },
}

impl Value {
    /// Builds a unary operation.
    pub fn unary(op: UnaryOp, operand: impl Into<Value>) -> Value {
        Value::Unary {
            op,
            operand: Box::new(operand.into()),
        }
    }

    /// Builds a binary operation.
    pub fn binary(op: BinaryOp, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Value {
        Value::Binary {
            op,
            lhs: Box::new(lhs.into()),
            rhs: Box::new(rhs.into()),
        }
    }

    /// A literal truncated to `shape`.
    pub fn sized(value: impl Into<BigInt>, shape: impl Into<Shape>) -> Value {
        Value::Const(Const::sized(value, shape))
    }

    /// The clock of `domain`.
    pub fn clock(domain: impl Into<String>) -> Value {
        Value::ClockSignal {
            domain: domain.into(),
        }
    }

    /// The reset of `domain`; conversion fails if the domain has no reset.
    pub fn reset(domain: impl Into<String>) -> Value {
        Value::ResetSignal {
            domain: domain.into(),
            allow_reset_less: false,
        }
    }

    /// The reset of `domain`, or constant 0 if the domain has no reset.
    pub fn reset_or_zero(domain: impl Into<String>) -> Value {
        Value::ResetSignal {
            domain: domain.into(),
            allow_reset_less: true,
        }
    }

    /// Width and signedness of this value.
    pub fn shape(&self) -> Shape {
        infer(self)
    }

    /// Returns the signal if this value is a bare signal.
    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the constant if this value is a literal.
    pub fn as_const(&self) -> Option<&Const> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Rejects nodes the operators accept but no back end can give a
    /// meaning to: negative constant shift amounts and empty replications.
    pub fn check(&self) -> ElabResult<()> {
        let mut error = None;
        crate::visit::walk_value(self, &mut |node| {
            if error.is_some() {
                return;
            }
            match node {
                Value::Binary { op, rhs, .. } if op.is_shift() => {
                    if let Value::Const(c) = rhs.as_ref() {
                        if c.value < BigInt::from(0) {
                            error = Some(ElabError::MalformedExpression {
                                position: node.to_string(),
                                detail: format!("shift amount {} is negative", c.value),
                            });
                        }
                    }
                }
                Value::Replicate { count: 0, .. } => {
                    error = Some(ElabError::MalformedExpression {
                        position: node.to_string(),
                        detail: "a replication needs at least one copy".into(),
                    });
                }
                _ => {}
            }
        });
        error.map_or(Ok(()), Err)
    }
}

/// Concatenates `parts`, least significant first.
pub fn cat<V: Into<Value>>(parts: impl IntoIterator<Item = V>) -> Value {
    Value::Concat(parts.into_iter().map(Into::into).collect())
}

/// `cond ? then : otherwise`.
pub fn mux(cond: impl Into<Value>, then: impl Into<Value>, otherwise: impl Into<Value>) -> Value {
    Value::Mux {
        selector: Box::new(cond.into()),
        choices: vec![otherwise.into(), then.into()],
    }
}

/// Indexes `choices` by `selector`.
///
/// Also usable as an assignment target, in which case only the selected
/// choice is driven.
pub fn array<V: Into<Value>>(
    selector: impl Into<Value>,
    choices: impl IntoIterator<Item = V>,
) -> ElabResult<Value> {
    let choices: Vec<Value> = choices.into_iter().map(Into::into).collect();
    if choices.is_empty() {
        return Err(ElabError::MalformedExpression {
            position: "array".into(),
            detail: "an array needs at least one choice".into(),
        });
    }
    Ok(Value::Mux {
        selector: Box::new(selector.into()),
        choices,
    })
}

/// Expression combinators shared by [`Value`] and [`Signal`].
pub trait ValueOps: Into<Value> + Sized {
    /// `self == rhs`, one bit.
    fn cmp_eq(self, rhs: impl Into<Value>) -> Value {
        Value::binary(BinaryOp::Eq, self, rhs)
    }

    /// `self != rhs`, one bit.
    fn cmp_ne(self, rhs: impl Into<Value>) -> Value {
        Value::binary(BinaryOp::Ne, self, rhs)
    }

    /// `self < rhs`, one bit.
    fn cmp_lt(self, rhs: impl Into<Value>) -> Value {
        Value::binary(BinaryOp::Lt, self, rhs)
    }

    /// `self <= rhs`, one bit.
    fn cmp_le(self, rhs: impl Into<Value>) -> Value {
        Value::binary(BinaryOp::Le, self, rhs)
    }

    /// `self > rhs`, one bit.
    fn cmp_gt(self, rhs: impl Into<Value>) -> Value {
        Value::binary(BinaryOp::Gt, self, rhs)
    }

    /// `self >= rhs`, one bit.
    fn cmp_ge(self, rhs: impl Into<Value>) -> Value {
        Value::binary(BinaryOp::Ge, self, rhs)
    }

    /// Bits `start..stop`.
    fn slice(self, start: u32, stop: u32) -> ElabResult<Value> {
        let value = self.into();
        let width = infer(&value).width;
        if start >= stop || stop > width {
            return Err(ElabError::SliceOutOfBounds { start, stop, width });
        }
        Ok(Value::Slice {
            value: Box::new(value),
            start,
            stop,
        })
    }

    /// Bit `index`.
    fn bit(self, index: u32) -> ElabResult<Value> {
        self.slice(index, index.saturating_add(1))
    }

    /// `width` bits starting at `offset`, which may be a run-time value.
    fn part(self, offset: impl Into<Value>, width: u32) -> ElabResult<Value> {
        let offset = offset.into();
        match &offset {
            Value::Const(c) => {
                let start = u32::try_from(&c.value).map_err(|_| ElabError::MalformedExpression {
                    position: "part".into(),
                    detail: format!("offset {} is not a valid bit index", c.value),
                })?;
                self.slice(start, start.saturating_add(width))
            }
            _ => Value::binary(BinaryOp::Shr, self, offset).slice(0, width),
        }
    }

    /// `count` copies side by side. `count` must be at least one.
    fn replicate(self, count: u32) -> ElabResult<Value> {
        if count == 0 {
            return Err(ElabError::MalformedExpression {
                position: "replicate".into(),
                detail: "a replication needs at least one copy".into(),
            });
        }
        Ok(Value::Replicate {
            value: Box::new(self.into()),
            count,
        })
    }

    /// One bit, set when any bit of `self` is set.
    fn as_bool(self) -> Value {
        Value::binary(BinaryOp::Ne, self, 0)
    }

    /// Assignment of `rhs` to `self`.
    fn assign(self, rhs: impl Into<Value>) -> Statement {
        Statement::Assign {
            lhs: self.into(),
            rhs: rhs.into(),
        }
    }
}

impl ValueOps for Value {}
impl ValueOps for &Value {}
impl ValueOps for Signal {}
impl ValueOps for &Signal {}

impl From<Signal> for Value {
    fn from(s: Signal) -> Self {
        Value::Signal(s)
    }
}

impl From<&Signal> for Value {
    fn from(s: &Signal) -> Self {
        Value::Signal(s.clone())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl From<Const> for Value {
    fn from(c: Const) -> Self {
        Value::Const(c)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Const(Const::sized(u8::from(b), 1))
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Const(Const::new(v))
                }
            }
        )*
    };
}

impl_from_int!(i32, i64, u8, u32, u64, usize, BigInt);

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Value>> std::ops::$trait<T> for Value {
            type Output = Value;
            fn $method(self, rhs: T) -> Value {
                Value::binary($op, self, rhs)
            }
        }

        impl<T: Into<Value>> std::ops::$trait<T> for &Value {
            type Output = Value;
            fn $method(self, rhs: T) -> Value {
                Value::binary($op, self, rhs)
            }
        }

        impl<T: Into<Value>> std::ops::$trait<T> for Signal {
            type Output = Value;
            fn $method(self, rhs: T) -> Value {
                Value::binary($op, self, rhs)
            }
        }

        impl<T: Into<Value>> std::ops::$trait<T> for &Signal {
            type Output = Value;
            fn $method(self, rhs: T) -> Value {
                Value::binary($op, self, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(BitAnd, bitand, BinaryOp::And);
impl_binary_op!(BitOr, bitor, BinaryOp::Or);
impl_binary_op!(BitXor, bitxor, BinaryOp::Xor);
impl_binary_op!(Shl, shl, BinaryOp::Shl);
impl_binary_op!(Shr, shr, BinaryOp::Shr);

macro_rules! impl_unary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for Value {
            type Output = Value;
            fn $method(self) -> Value {
                Value::unary($op, self)
            }
        }

        impl std::ops::$trait for &Value {
            type Output = Value;
            fn $method(self) -> Value {
                Value::unary($op, self)
            }
        }

        impl std::ops::$trait for Signal {
            type Output = Value;
            fn $method(self) -> Value {
                Value::unary($op, self)
            }
        }

        impl std::ops::$trait for &Signal {
            type Output = Value;
            fn $method(self) -> Value {
                Value::unary($op, self)
            }
        }
    };
}

impl_unary_op!(Not, not, UnaryOp::Invert);
impl_unary_op!(Neg, neg, UnaryOp::Neg);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(c) => write!(f, "{}", c.value),
            Value::Signal(s) => write!(f, "{}", s.name()),
            Value::ClockSignal { domain } => write!(f, "ClockSignal({domain})"),
            Value::ResetSignal { domain, .. } => write!(f, "ResetSignal({domain})"),
            Value::Unary { op, operand } => match op {
                UnaryOp::Invert => write!(f, "~{operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
            },
            Value::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Value::Slice { value, start, stop } => write!(f, "{value}[{start}:{stop}]"),
            Value::Concat(parts) => {
                write!(f, "{{")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, "}}")
            }
            Value::Replicate { value, count } => write!(f, "{{{count}{{{value}}}}}"),
            Value::Mux { selector, choices } => {
                write!(f, "{selector}?[")?;
                for (i, c) in choices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_minimum_representation() {
        assert_eq!(Const::new(7).shape, Shape::unsigned(3));
        assert_eq!(Const::new(-1).shape, Shape::signed(1));
        assert_eq!(Const::new(0).shape, Shape::unsigned(1));
    }

    #[test]
    fn const_sized_wraps() {
        let c = Const::sized(300, 8);
        assert_eq!(c.value, BigInt::from(44));
        let c = Const::sized(-1, 4);
        assert_eq!(c.value, BigInt::from(15));
    }

    #[test]
    fn operators_build_nodes() {
        let a = Signal::new("a", 4);
        let v = &a + 1;
        match v {
            Value::Binary { op, ref lhs, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert_eq!(**lhs, Value::Signal(a.clone()));
            }
            _ => panic!("expected binary node"),
        }
        assert!(matches!(!&a, Value::Unary { op: UnaryOp::Invert, .. }));
        assert!(matches!(-a, Value::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn slice_checks_bounds() {
        let a = Signal::new("a", 8);
        assert!(a.clone().slice(0, 8).is_ok());
        assert_eq!(
            a.clone().slice(4, 9),
            Err(ElabError::SliceOutOfBounds {
                start: 4,
                stop: 9,
                width: 8
            })
        );
        assert!(a.clone().slice(3, 3).is_err());
        assert!(a.bit(8).is_err());
    }

    #[test]
    fn part_with_constant_offset_is_slice() {
        let a = Signal::new("a", 8);
        let p = a.part(2, 3).unwrap();
        assert!(matches!(p, Value::Slice { start: 2, stop: 5, .. }));
    }

    #[test]
    fn part_with_dynamic_offset_shifts() {
        let a = Signal::new("a", 8);
        let off = Signal::new("off", 3);
        let p = a.part(&off, 4).unwrap();
        match p {
            Value::Slice { value, start: 0, stop: 4 } => {
                assert!(matches!(*value, Value::Binary { op: BinaryOp::Shr, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_replication_rejected() {
        let a = Signal::new("a", 4);
        assert!(matches!(
            a.clone().replicate(0),
            Err(ElabError::MalformedExpression { .. })
        ));
        assert_eq!(infer(&a.replicate(2).unwrap()), Shape::unsigned(8));
    }

    #[test]
    fn check_rejects_negative_constant_shift() {
        let a = Signal::new("a", 4);
        let err = (&a << -1).check().unwrap_err();
        assert!(
            matches!(err, ElabError::MalformedExpression { ref detail, .. } if detail.contains("-1")),
            "{err:?}"
        );
        assert!((&a << 2).check().is_ok());
        let hidden = Value::Replicate {
            value: Box::new(Value::from(&a)),
            count: 0,
        };
        assert!(cat([Value::from(&a), hidden]).check().is_err());
    }

    #[test]
    fn mux_orders_choices() {
        let c = Signal::new("c", 1);
        let v = mux(&c, 5, 6);
        match v {
            Value::Mux { choices, .. } => {
                assert_eq!(choices[0], Value::from(6));
                assert_eq!(choices[1], Value::from(5));
            }
            _ => panic!("expected mux"),
        }
    }

    #[test]
    fn empty_array_rejected() {
        let sel = Signal::new("sel", 2);
        assert!(array::<Value>(&sel, []).is_err());
    }

    #[test]
    fn assign_builds_statement() {
        let a = Signal::new("a", 4);
        let st = a.assign(3);
        assert!(matches!(st, Statement::Assign { .. }));
    }

    #[test]
    fn display_expression() {
        let a = Signal::new("a", 4);
        let b = Signal::new("b", 4);
        let v = cat([(&a + &b), Value::from(&a)]);
        assert_eq!(v.to_string(), "{(a + b), a}");
        assert_eq!(a.bit(2).unwrap().to_string(), "a[2:3]");
    }
}
