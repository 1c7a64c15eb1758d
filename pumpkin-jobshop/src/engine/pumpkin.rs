use std::time::Duration;
use std::time::Instant;

use log::debug;
use pumpkin_solver::constraints;
use pumpkin_solver::constraints::Constraint as SolverConstraint;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::linear_unsat_sat::LinearUnsatSat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::optimisation::OptimisationStrategy;
use pumpkin_solver::results::OptimisationResult;
use pumpkin_solver::results::ProblemSolution;
use pumpkin_solver::results::SolutionReference;
use pumpkin_solver::termination::Combinator;
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::AffineView;
use pumpkin_solver::variables::DomainId;
use pumpkin_solver::variables::Literal as SolverLiteral;
use pumpkin_solver::variables::TransformableVariable;
use pumpkin_solver::ConstraintOperationError;
use pumpkin_solver::DefaultBrancher;
use pumpkin_solver::Solver;

use super::Assignment;
use super::Engine;
use super::EngineError;
use super::OsSignal;
use super::SolveOutcome;
use super::SolveStatus;
use crate::model::Comparison;
use crate::model::Constraint;
use crate::model::IntVarId;
use crate::model::IntervalId;
use crate::model::LinearConstraint;
use crate::model::LinearTerm;
use crate::model::Literal;
use crate::model::Model;

#[derive(Debug, Clone, Copy, Default)]
pub struct PumpkinEngineOptions {
    /// The optimisation procedure used to minimise the objective.
    pub optimisation_strategy: OptimisationStrategy,
}

/// An [`Engine`] which solves every model with a fresh Pumpkin [`Solver`].
#[derive(Debug, Default)]
pub struct PumpkinEngine {
    options: PumpkinEngineOptions,
    os_signal: Option<OsSignal>,
}

impl PumpkinEngine {
    pub fn new(options: PumpkinEngineOptions) -> Self {
        PumpkinEngine {
            options,
            os_signal: None,
        }
    }

    /// Also stop the search when `os_signal` triggers.
    pub fn with_os_signal(mut self, os_signal: OsSignal) -> Self {
        self.os_signal = Some(os_signal);
        self
    }
}

impl Engine for PumpkinEngine {
    fn solve(&mut self, model: &Model, time_budget: Duration) -> Result<SolveOutcome, EngineError> {
        let (lower, upper) = objective_bounds(model);
        let (Ok(objective_lower), Ok(objective_upper)) =
            (i32::try_from(lower), i32::try_from(upper))
        else {
            return Err(EngineError::ObjectiveOutOfRange { lower, upper });
        };

        let start_time = Instant::now();
        let mut solver = Solver::default();

        let translation =
            match Translation::new(&mut solver, model, objective_lower, objective_upper) {
                Ok(translation) => translation,
                Err(error) => {
                    debug!("Root-level conflict while posting the model: {error:?}");
                    return Ok(SolveOutcome::infeasible());
                }
            };
        debug!(
            "Translated the model in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );

        let mut brancher = solver.default_brancher();
        let mut termination = Combinator::new(
            TimeBudget::starting_now(time_budget),
            self.os_signal.clone(),
        );
        let callback: fn(&Solver, SolutionReference, &DefaultBrancher) = |_, _, _| {};

        let objective = translation.objective;
        let result = match self.options.optimisation_strategy {
            OptimisationStrategy::LinearSatUnsat => solver.optimise(
                &mut brancher,
                &mut termination,
                LinearSatUnsat::new(OptimisationDirection::Minimise, objective, callback),
            ),
            OptimisationStrategy::LinearUnsatSat => solver.optimise(
                &mut brancher,
                &mut termination,
                LinearUnsatSat::new(OptimisationDirection::Minimise, objective, callback),
            ),
        };

        let outcome = match result {
            OptimisationResult::Optimal(solution) => {
                translation.outcome(SolveStatus::Optimal, &solution)
            }
            OptimisationResult::Satisfiable(solution) => {
                translation.outcome(SolveStatus::Feasible, &solution)
            }
            OptimisationResult::Unsatisfiable => SolveOutcome::infeasible(),
            OptimisationResult::Unknown => SolveOutcome::unknown(),
        };

        debug!(
            "Pumpkin finished with status {} after {:.3}s",
            outcome.status,
            start_time.elapsed().as_secs_f64()
        );

        Ok(outcome)
    }
}

/// The range of the objective, computed without overflow.
fn objective_bounds(model: &Model) -> (i64, i64) {
    let Some(objective) = model.objective() else {
        return (0, 0);
    };

    objective
        .terms
        .iter()
        .map(|term| {
            let domain = model.domain(term.variable);
            let coefficient = i64::from(term.coefficient);
            let at_lower = coefficient * i64::from(domain.lower_bound);
            let at_upper = coefficient * i64::from(domain.upper_bound);
            (at_lower.min(at_upper), at_lower.max(at_upper))
        })
        .fold((0, 0), |(lower, upper), (term_lower, term_upper)| {
            (lower + term_lower, upper + term_upper)
        })
}

/// The Pumpkin variables which represent the variables of a [`Model`].
#[derive(Debug)]
struct Translation {
    integers: Vec<DomainId>,
    booleans: Vec<SolverLiteral>,
    objective: DomainId,
}

impl Translation {
    fn new(
        solver: &mut Solver,
        model: &Model,
        objective_lower: i32,
        objective_upper: i32,
    ) -> Result<Translation, ConstraintOperationError> {
        let integers = model
            .integers()
            .map(|(_, domain)| solver.new_bounded_integer(domain.lower_bound, domain.upper_bound))
            .collect::<Vec<_>>();
        let booleans = (0..model.num_booleans())
            .map(|_| solver.new_literal())
            .collect::<Vec<_>>();
        let objective = solver.new_bounded_integer(objective_lower, objective_upper);

        let translation = Translation {
            integers,
            booleans,
            objective,
        };

        for interval in model.intervals() {
            let tag = solver.new_constraint_tag();
            let length = constraints::equals(
                [
                    translation.integer(interval.end).scaled(1),
                    translation.integer(interval.start).scaled(-1),
                ],
                interval.duration,
                tag,
            );
            post_enforced(
                solver,
                length,
                interval
                    .presence
                    .map(|presence| translation.literal(presence.into())),
            )?;
        }

        for constraint in model.constraints() {
            translation.post(solver, model, constraint)?;
        }

        match model.objective() {
            Some(objective) => {
                let terms = translation
                    .terms(&objective.terms)
                    .chain(std::iter::once(translation.objective.scaled(-1)))
                    .collect::<Vec<_>>();
                let tag = solver.new_constraint_tag();
                solver.add_constraint(constraints::equals(terms, 0, tag)).post()?;
            }
            None => {
                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::equals([translation.objective.scaled(1)], 0, tag))
                    .post()?;
            }
        }

        Ok(translation)
    }

    fn integer(&self, variable: IntVarId) -> DomainId {
        self.integers[variable.index()]
    }

    fn literal(&self, literal: Literal) -> SolverLiteral {
        let solver_literal = self.booleans[literal.variable().index()];
        if literal.is_positive() {
            solver_literal
        } else {
            !solver_literal
        }
    }

    fn terms<'a>(
        &'a self,
        terms: &'a [LinearTerm],
    ) -> impl Iterator<Item = AffineView<DomainId>> + 'a {
        terms
            .iter()
            .map(|term| self.integer(term.variable).scaled(term.coefficient))
    }

    fn post(
        &self,
        solver: &mut Solver,
        model: &Model,
        constraint: &Constraint,
    ) -> Result<(), ConstraintOperationError> {
        match constraint {
            Constraint::Linear(linear) => self.post_linear(solver, linear),

            Constraint::ExactlyK { variables, count } => {
                let literals = variables
                    .iter()
                    .map(|&variable| self.literal(variable.into()))
                    .collect::<Vec<_>>();
                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::equals(literals, *count, tag))
                    .post()
            }

            Constraint::Minimum { target, array } => {
                let array = array.iter().map(|&variable| self.integer(variable));
                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::minimum(array, self.integer(*target), tag))
                    .post()
            }

            Constraint::Maximum { target, array } => {
                let array = array.iter().map(|&variable| self.integer(variable));
                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::maximum(array, self.integer(*target), tag))
                    .post()
            }

            Constraint::NoOverlap { intervals } => self.post_no_overlap(solver, model, intervals),
        }
    }

    fn post_linear(
        &self,
        solver: &mut Solver,
        linear: &LinearConstraint,
    ) -> Result<(), ConstraintOperationError> {
        let terms = self.terms(&linear.terms).collect::<Vec<_>>();
        let enforcement = linear.enforcement.map(|literal| self.literal(literal));
        let tag = solver.new_constraint_tag();

        match linear.comparison {
            Comparison::Equal => post_enforced(
                solver,
                constraints::equals(terms, linear.rhs, tag),
                enforcement,
            ),
            Comparison::NotEqual => post_enforced(
                solver,
                constraints::not_equals(terms, linear.rhs, tag),
                enforcement,
            ),
            Comparison::LessThanOrEqual => post_enforced(
                solver,
                constraints::less_than_or_equals(terms, linear.rhs, tag),
                enforcement,
            ),
        }
    }

    /// Every pair of present intervals of non-zero length is ordered by one of two literals: one
    /// puts `a` before `b`, the other `b` before `a`. An absent interval releases the pair.
    fn post_no_overlap(
        &self,
        solver: &mut Solver,
        model: &Model,
        intervals: &[IntervalId],
    ) -> Result<(), ConstraintOperationError> {
        let intervals = intervals
            .iter()
            .map(|&interval| model.interval(interval))
            .filter(|interval| interval.duration > 0)
            .collect::<Vec<_>>();

        for (index, a) in intervals.iter().enumerate() {
            for b in &intervals[index + 1..] {
                let a_first = solver.new_literal();
                let b_first = solver.new_literal();

                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::less_than_or_equals(
                        [self.integer(a.end).scaled(1), self.integer(b.start).scaled(-1)],
                        0,
                        tag,
                    ))
                    .implied_by(a_first)?;

                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::less_than_or_equals(
                        [self.integer(b.end).scaled(1), self.integer(a.start).scaled(-1)],
                        0,
                        tag,
                    ))
                    .implied_by(b_first)?;

                let mut clause = vec![a_first, b_first];
                clause.extend(
                    [a.presence, b.presence]
                        .into_iter()
                        .flatten()
                        .map(|presence| !self.literal(presence.into())),
                );
                let tag = solver.new_constraint_tag();
                solver
                    .add_constraint(constraints::clause(clause, tag))
                    .post()?;
            }
        }

        Ok(())
    }

    fn outcome(&self, status: SolveStatus, solution: &impl ProblemSolution) -> SolveOutcome {
        let assignment = Assignment::new(
            self.integers
                .iter()
                .map(|&domain| solution.get_integer_value(domain))
                .collect(),
            self.booleans
                .iter()
                .map(|&literal| solution.get_literal_value(literal))
                .collect(),
        );

        SolveOutcome {
            status,
            assignment: Some(assignment),
            objective_value: Some(i64::from(solution.get_integer_value(self.objective))),
        }
    }
}

fn post_enforced(
    solver: &mut Solver,
    constraint: impl SolverConstraint,
    enforcement: Option<SolverLiteral>,
) -> Result<(), ConstraintOperationError> {
    let poster = solver.add_constraint(constraint);
    match enforcement {
        Some(literal) => poster.implied_by(literal),
        None => poster.post(),
    }
}
