//! Solving a [`Model`] within a time budget.
//!
//! The scheduler only depends on the [`Engine`] trait. [`PumpkinEngine`] implements it on top of
//! the Pumpkin solver.

mod os_signal;
mod pumpkin;

use std::fmt::Display;
use std::time::Duration;

pub use os_signal::OsSignal;
pub use pumpkin::*;
use thiserror::Error;

use crate::model::BoolVarId;
use crate::model::IntVarId;
use crate::model::Literal;
use crate::model::Model;

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// A solution was found and proven to be optimal.
    Optimal,
    /// A solution was found, but the search stopped before proving it optimal.
    Feasible,
    /// The model has no solution.
    Infeasible,
    /// The search stopped before finding a solution or proving there is none.
    Unknown,
}

impl SolveStatus {
    /// Whether a solve with this status comes with an assignment.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::Feasible => write!(f, "FEASIBLE"),
            SolveStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolveStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A value for every variable of a [`Model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    integers: Vec<i32>,
    booleans: Vec<bool>,
}

impl Assignment {
    /// `integers[i]` is the value of the integer with index `i`, and likewise for `booleans`.
    pub fn new(integers: Vec<i32>, booleans: Vec<bool>) -> Self {
        Assignment { integers, booleans }
    }

    pub fn integer_value(&self, variable: IntVarId) -> i32 {
        self.integers[variable.index()]
    }

    pub fn boolean_value(&self, variable: BoolVarId) -> bool {
        self.booleans[variable.index()]
    }

    pub fn literal_value(&self, literal: Literal) -> bool {
        literal.evaluate(self.boolean_value(literal.variable()))
    }
}

/// The result of [`Engine::solve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub assignment: Option<Assignment>,
    pub objective_value: Option<i64>,
}

impl SolveOutcome {
    pub fn infeasible() -> Self {
        SolveOutcome {
            status: SolveStatus::Infeasible,
            assignment: None,
            objective_value: None,
        }
    }

    pub fn unknown() -> Self {
        SolveOutcome {
            status: SolveStatus::Unknown,
            assignment: None,
            objective_value: None,
        }
    }

    /// The assignment, if the status guarantees that it is a solution.
    pub fn usable_assignment(&self) -> Option<&Assignment> {
        if self.status.has_solution() {
            self.assignment.as_ref()
        } else {
            None
        }
    }
}

/// Minimises the objective of a [`Model`].
pub trait Engine {
    /// Solve `model`, stopping the search after `time_budget`. A model without objective is
    /// solved as a satisfaction problem.
    fn solve(&mut self, model: &Model, time_budget: Duration) -> Result<SolveOutcome, EngineError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("the objective ranges over [{lower}, {upper}], which exceeds the supported range")]
    ObjectiveOutOfRange { lower: i64, upper: i64 },

    #[error("the engine failed to report a result: {0}")]
    Failed(String),
}
