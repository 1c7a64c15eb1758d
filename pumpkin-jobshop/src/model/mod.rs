//! A solver-independent constraint model.
//!
//! The [`Model`] holds integer and boolean decision variables, optional interval variables, a list
//! of [`Constraint`]s and a linear objective which is minimised. It is built by the
//! [`GroupModelBuilder`] and handed to an [`Engine`] which solves it.
//!
//! All values are `i32`, as that is the domain type of the solver used by the default engine.
//!
//! [`Engine`]: crate::engine::Engine

mod builder;

use std::ops::Not;

pub use builder::*;
use thiserror::Error;

/// Identifies an integer variable of a [`Model`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntVarId(u32);

/// Identifies a boolean variable of a [`Model`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolVarId(u32);

/// Identifies an interval variable of a [`Model`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalId(u32);

macro_rules! impl_index {
    ($($id:ident),*) => {
        $(
            impl $id {
                pub fn index(self) -> usize {
                    self.0 as usize
                }

                fn from_index(index: usize) -> Self {
                    $id(u32::try_from(index).expect("more than u32::MAX variables in a model"))
                }
            }
        )*
    };
}

impl_index!(IntVarId, BoolVarId, IntervalId);

/// A boolean variable or its negation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    variable: BoolVarId,
    is_positive: bool,
}

impl Literal {
    pub fn variable(self) -> BoolVarId {
        self.variable
    }

    pub fn is_positive(self) -> bool {
        self.is_positive
    }

    /// Evaluate the literal given the value of its variable.
    pub fn evaluate(self, value: bool) -> bool {
        value == self.is_positive
    }
}

impl From<BoolVarId> for Literal {
    fn from(variable: BoolVarId) -> Self {
        Literal {
            variable,
            is_positive: true,
        }
    }
}

impl Not for Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        Literal {
            variable: self.variable,
            is_positive: !self.is_positive,
        }
    }
}

impl Not for BoolVarId {
    type Output = Literal;

    fn not(self) -> Self::Output {
        !Literal::from(self)
    }
}

/// The bounds `[lower_bound, upper_bound]` of an integer variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegerDomain {
    pub lower_bound: i32,
    pub upper_bound: i32,
}

/// An interval `[start, end)` of fixed length. If it has a presence variable, the interval only
/// exists (and `end = start + duration` only holds) when that variable is true.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalVariable {
    pub start: IntVarId,
    pub end: IntVarId,
    pub duration: i32,
    pub presence: Option<BoolVarId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearTerm {
    pub coefficient: i32,
    pub variable: IntVarId,
}

impl LinearTerm {
    pub fn new(coefficient: i32, variable: IntVarId) -> Self {
        LinearTerm {
            coefficient,
            variable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThanOrEqual,
}

/// The constraint `sum(terms) <comparison> rhs`, which is only enforced when the enforcement
/// literal (if any) is true.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearConstraint {
    pub terms: Box<[LinearTerm]>,
    pub comparison: Comparison,
    pub rhs: i32,
    pub enforcement: Option<Literal>,
}

impl LinearConstraint {
    pub fn new(terms: impl Into<Box<[LinearTerm]>>, comparison: Comparison, rhs: i32) -> Self {
        LinearConstraint {
            terms: terms.into(),
            comparison,
            rhs,
            enforcement: None,
        }
    }

    /// `variable == value`
    pub fn fixed(variable: IntVarId, value: i32) -> Self {
        LinearConstraint::new([LinearTerm::new(1, variable)], Comparison::Equal, value)
    }

    /// `lhs - rhs <comparison> constant`
    fn difference(lhs: IntVarId, rhs: IntVarId, comparison: Comparison, constant: i32) -> Self {
        LinearConstraint::new(
            [LinearTerm::new(1, lhs), LinearTerm::new(-1, rhs)],
            comparison,
            constant,
        )
    }

    /// `lhs == rhs`
    pub fn binary_equals(lhs: IntVarId, rhs: IntVarId) -> Self {
        LinearConstraint::difference(lhs, rhs, Comparison::Equal, 0)
    }

    /// `lhs != rhs`
    pub fn binary_not_equals(lhs: IntVarId, rhs: IntVarId) -> Self {
        LinearConstraint::difference(lhs, rhs, Comparison::NotEqual, 0)
    }

    /// `lhs <= rhs`
    pub fn binary_less_than_or_equals(lhs: IntVarId, rhs: IntVarId) -> Self {
        LinearConstraint::difference(lhs, rhs, Comparison::LessThanOrEqual, 0)
    }

    /// `lhs < rhs`
    pub fn binary_less_than(lhs: IntVarId, rhs: IntVarId) -> Self {
        LinearConstraint::difference(lhs, rhs, Comparison::LessThanOrEqual, -1)
    }

    /// `lhs - rhs == constant`
    pub fn difference_equals(lhs: IntVarId, rhs: IntVarId, constant: i32) -> Self {
        LinearConstraint::difference(lhs, rhs, Comparison::Equal, constant)
    }

    /// Half-reify the constraint: it is only enforced when `literal` is true.
    pub fn implied_by(mut self, literal: impl Into<Literal>) -> Self {
        self.enforcement = Some(literal.into());
        self
    }

    /// Evaluate the left-hand side given the values of the integer variables.
    pub fn lhs(&self, value: impl Fn(IntVarId) -> i32) -> i64 {
        self.terms
            .iter()
            .map(|term| i64::from(term.coefficient) * i64::from(value(term.variable)))
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    Linear(LinearConstraint),
    /// Exactly `count` of the boolean variables are true.
    ExactlyK {
        variables: Box<[BoolVarId]>,
        count: i32,
    },
    /// `target == min(array)`
    Minimum {
        target: IntVarId,
        array: Box<[IntVarId]>,
    },
    /// `target == max(array)`
    Maximum {
        target: IntVarId,
        array: Box<[IntVarId]>,
    },
    /// The present intervals are pairwise disjoint.
    NoOverlap { intervals: Box<[IntervalId]> },
}

impl From<LinearConstraint> for Constraint {
    fn from(linear: LinearConstraint) -> Self {
        Constraint::Linear(linear)
    }
}

/// Minimise `sum(terms)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Objective {
    pub terms: Vec<LinearTerm>,
}

/// Size statistics of a [`Model`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModelStatistics {
    pub num_integers: usize,
    pub num_booleans: usize,
    pub num_intervals: usize,
    pub num_constraints: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Model {
    integers: Vec<IntegerDomain>,
    num_booleans: usize,
    intervals: Vec<IntervalVariable>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl Model {
    /// Create an integer variable with domain `[lower_bound, upper_bound]`.
    pub fn new_integer(&mut self, lower_bound: i32, upper_bound: i32) -> IntVarId {
        assert!(
            lower_bound <= upper_bound,
            "empty domain [{lower_bound}, {upper_bound}]"
        );
        self.integers.push(IntegerDomain {
            lower_bound,
            upper_bound,
        });
        IntVarId::from_index(self.integers.len() - 1)
    }

    pub fn new_boolean(&mut self) -> BoolVarId {
        self.num_booleans += 1;
        BoolVarId::from_index(self.num_booleans - 1)
    }

    /// Create an interval of length `duration` from `start` to `end`, which only exists when
    /// `presence` is true.
    pub fn new_optional_interval(
        &mut self,
        start: IntVarId,
        end: IntVarId,
        duration: i32,
        presence: BoolVarId,
    ) -> IntervalId {
        self.intervals.push(IntervalVariable {
            start,
            end,
            duration,
            presence: Some(presence),
        });
        IntervalId::from_index(self.intervals.len() - 1)
    }

    pub fn add_constraint(&mut self, constraint: impl Into<Constraint>) {
        self.constraints.push(constraint.into());
    }

    pub fn minimise(&mut self, objective: Objective) {
        self.objective = Some(objective);
    }

    pub fn domain(&self, variable: IntVarId) -> IntegerDomain {
        self.integers[variable.index()]
    }

    pub fn interval(&self, interval: IntervalId) -> IntervalVariable {
        self.intervals[interval.index()]
    }

    pub fn integers(&self) -> impl Iterator<Item = (IntVarId, IntegerDomain)> + '_ {
        self.integers
            .iter()
            .enumerate()
            .map(|(index, domain)| (IntVarId::from_index(index), *domain))
    }

    pub fn num_integers(&self) -> usize {
        self.integers.len()
    }

    pub fn num_booleans(&self) -> usize {
        self.num_booleans
    }

    pub fn intervals(&self) -> &[IntervalVariable] {
        &self.intervals
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn statistics(&self) -> ModelStatistics {
        ModelStatistics {
            num_integers: self.integers.len(),
            num_booleans: self.num_booleans,
            num_intervals: self.intervals.len(),
            num_constraints: self.constraints.len(),
        }
    }
}

/// A group of jobs which cannot be represented within the `i32` time domain of the model.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ModelError {
    #[error("the scheduling horizon {0} exceeds the supported time range")]
    HorizonOverflow(i64),

    #[error("the weight {0} cannot be scaled to an integer objective coefficient")]
    WeightOverflow(f64),

    #[error("{0} slices exceed the supported number of slices")]
    TooManySlices(usize),
}
