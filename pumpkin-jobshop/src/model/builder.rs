use log::debug;

use super::BoolVarId;
use super::Constraint;
use super::IntVarId;
use super::IntervalId;
use super::LinearConstraint;
use super::LinearTerm;
use super::Model;
use super::ModelError;
use super::Objective;
use crate::availability::Availability;
use crate::engine::Assignment;
use crate::instance::Job;

/// The objective coefficient of the makespan.
pub const MAKESPAN_COEFFICIENT: i32 = 10_000;

/// Job weights are multiplied by this factor and rounded to the nearest integer to obtain their
/// objective coefficient. Two weights which differ by less than `0.5 / WEIGHT_SCALE` may
/// therefore receive the same coefficient, and every coefficient is off by at most that amount.
///
/// When the objective of a group cannot be represented by the engine, both this factor and
/// [`MAKESPAN_COEFFICIENT`] are divided by the [objective divisor](GroupModel::objective_divisor)
/// of the group before rounding, which widens the rounding error by the same factor. The
/// makespan coefficient never drops below 1.
pub const WEIGHT_SCALE: f64 = 10_000.0;

/// Options which influence the shape of the model, but not its set of solutions (up to symmetry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    /// Whether operations which start at the same time are forced into an order on their
    /// smallest assigned slice.
    ///
    /// This adds a literal and three constraints for every pair of operations in the group.
    pub symmetry_breaking: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            symmetry_breaking: true,
        }
    }
}

/// The variables created for a single operation.
#[derive(Debug, Clone)]
pub struct OperationVariables {
    pub start: IntVarId,
    pub end: IntVarId,
    /// The smallest slice the operation is assigned to, or the number of slices if it is not
    /// assigned to any.
    pub min_slice_index: IntVarId,
    /// `presences[m]` is true iff the operation runs on slice `m`.
    pub presences: Box<[BoolVarId]>,
}

/// The start time and the slices of an operation in a solved group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedOperation {
    pub start: i32,
    pub end: i32,
    pub slices: Vec<usize>,
}

/// Builds the [`Model`] of one decomposition group.
#[derive(Debug)]
pub struct GroupModelBuilder<'a> {
    jobs: &'a [&'a Job],
    availability: &'a Availability,
    options: ModelOptions,
}

impl<'a> GroupModelBuilder<'a> {
    pub fn new(jobs: &'a [&'a Job], availability: &'a Availability) -> Self {
        GroupModelBuilder {
            jobs,
            availability,
            options: ModelOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<GroupModel, ModelError> {
        let num_slices = self.availability.num_slices();
        let absent_index =
            i32::try_from(num_slices).map_err(|_| ModelError::TooManySlices(num_slices))?;

        let horizon = self.horizon()?;
        let min_start = self.availability.min_earliest_start();

        let mut model = Model::default();
        let mut slice_intervals: Vec<Vec<IntervalId>> = vec![vec![]; num_slices];

        let mut operations = Vec::with_capacity(self.jobs.len());
        let mut job_ends = Vec::with_capacity(self.jobs.len());

        for job in self.jobs {
            let mut job_operations: Vec<OperationVariables> =
                Vec::with_capacity(job.operations.len());

            for operation in &job.operations {
                // The horizon covers every duration, so this cannot fail once it is known.
                let duration = i32::try_from(operation.duration)
                    .map_err(|_| ModelError::HorizonOverflow(i64::from(operation.duration)))?;

                let start = model.new_integer(min_start, horizon);
                let end = model.new_integer(min_start, horizon);
                model.add_constraint(LinearConstraint::difference_equals(end, start, duration));

                let mut presences = Vec::with_capacity(num_slices);
                let mut slice_indices = Vec::with_capacity(num_slices);

                for (slice, intervals) in slice_intervals.iter_mut().enumerate() {
                    let earliest_start = self.availability.earliest_start(slice);
                    let slice_index = i32::try_from(slice)
                        .map_err(|_| ModelError::TooManySlices(num_slices))?;

                    let presence = model.new_boolean();
                    let local_start = model.new_integer(earliest_start, horizon);
                    let local_end = model.new_integer(earliest_start, horizon);
                    intervals.push(model.new_optional_interval(
                        local_start,
                        local_end,
                        duration,
                        presence,
                    ));

                    model.add_constraint(
                        LinearConstraint::binary_equals(local_start, start).implied_by(presence),
                    );
                    model.add_constraint(
                        LinearConstraint::binary_equals(local_end, end).implied_by(presence),
                    );

                    let index = model.new_integer(slice_index, absent_index);
                    model.add_constraint(
                        LinearConstraint::fixed(index, slice_index).implied_by(presence),
                    );
                    model.add_constraint(
                        LinearConstraint::fixed(index, absent_index).implied_by(!presence),
                    );

                    presences.push(presence);
                    slice_indices.push(index);
                }

                let min_slice_index = model.new_integer(0, absent_index);
                if slice_indices.is_empty() {
                    model.add_constraint(LinearConstraint::fixed(min_slice_index, absent_index));
                } else {
                    model.add_constraint(Constraint::Minimum {
                        target: min_slice_index,
                        array: slice_indices.into(),
                    });
                }

                model.add_constraint(Constraint::ExactlyK {
                    variables: presences.clone().into(),
                    count: i32::try_from(operation.slice_count).unwrap_or(i32::MAX),
                });

                for &dependency in &operation.dependencies {
                    model.add_constraint(LinearConstraint::binary_less_than_or_equals(
                        job_operations[dependency].end,
                        start,
                    ));
                }

                job_operations.push(OperationVariables {
                    start,
                    end,
                    min_slice_index,
                    presences: presences.into(),
                });
            }

            let job_end = model.new_integer(min_start, horizon);
            add_maximum(
                &mut model,
                job_end,
                job_operations.iter().map(|operation| operation.end),
                min_start,
            );

            job_ends.push(job_end);
            operations.push(job_operations);
        }

        let makespan = model.new_integer(min_start, horizon);
        add_maximum(&mut model, makespan, job_ends.iter().copied(), min_start);

        for intervals in slice_intervals {
            if intervals.len() > 1 {
                model.add_constraint(Constraint::NoOverlap {
                    intervals: intervals.into(),
                });
            }
        }

        if self.options.symmetry_breaking {
            self.break_symmetries(&mut model, &operations);
        }

        let weights = self.jobs.iter().map(|job| job.weight).collect::<Vec<_>>();
        let coefficients = objective_coefficients(&weights, horizon)?;
        if coefficients.divisor > 1 {
            debug!(
                "Divided the objective coefficients by {} to fit horizon {horizon}",
                coefficients.divisor
            );
        }

        let mut objective = Objective {
            terms: vec![LinearTerm::new(coefficients.makespan, makespan)],
        };
        for (&coefficient, &job_end) in coefficients.weights.iter().zip(job_ends.iter()) {
            objective.terms.push(LinearTerm::new(coefficient, job_end));
        }
        model.minimise(objective);

        debug!(
            "Built model for {} jobs with horizon {horizon}: {:?}",
            self.jobs.len(),
            model.statistics()
        );

        Ok(GroupModel {
            model,
            horizon,
            objective_divisor: coefficients.divisor,
            makespan,
            job_ends,
            operations,
        })
    }

    /// The latest time any operation of the group can end: all of the group's work is done
    /// sequentially after every slice has become available.
    fn horizon(&self) -> Result<i32, ModelError> {
        let total_duration: i64 = self
            .jobs
            .iter()
            .flat_map(|job| job.operations.iter())
            .map(|operation| i64::from(operation.duration))
            .sum();
        let horizon = i64::from(self.availability.max_earliest_start()) + total_duration;

        i32::try_from(horizon).map_err(|_| ModelError::HorizonOverflow(horizon))
    }

    /// For every pair of operations `(a, b)` with `a` before `b`, posts
    /// `start_a == start_b -> min_slice_index_a < min_slice_index_b`.
    ///
    /// Operations which use no slices are skipped, since their minimum slice index is always the
    /// sentinel and could never be ordered. Operations of zero duration are skipped as well: they
    /// may share a slice with another operation starting at the same time.
    fn break_symmetries(&self, model: &mut Model, operations: &[Vec<OperationVariables>]) {
        let candidates = self
            .jobs
            .iter()
            .zip(operations)
            .flat_map(|(job, variables)| job.operations.iter().zip(variables))
            .filter(|(operation, _)| operation.slice_count > 0 && operation.duration > 0)
            .map(|(_, variables)| variables)
            .collect::<Vec<_>>();

        let mut num_pairs = 0_usize;
        for (index, first) in candidates.iter().enumerate() {
            for second in &candidates[index + 1..] {
                let same_start = model.new_boolean();

                model.add_constraint(
                    LinearConstraint::binary_equals(first.start, second.start)
                        .implied_by(same_start),
                );
                model.add_constraint(
                    LinearConstraint::binary_not_equals(first.start, second.start)
                        .implied_by(!same_start),
                );
                model.add_constraint(
                    LinearConstraint::binary_less_than(
                        first.min_slice_index,
                        second.min_slice_index,
                    )
                    .implied_by(same_start),
                );

                num_pairs += 1;
            }
        }

        debug!("Added symmetry breaking for {num_pairs} pairs of operations");
    }
}

/// Posts `target == max(array)`, or fixes `target` to `empty` if there is nothing to take the
/// maximum over.
fn add_maximum(
    model: &mut Model,
    target: IntVarId,
    array: impl Iterator<Item = IntVarId>,
    empty: i32,
) {
    let array = array.collect::<Box<[_]>>();
    if array.is_empty() {
        model.add_constraint(LinearConstraint::fixed(target, empty));
    } else {
        model.add_constraint(Constraint::Maximum { target, array });
    }
}

#[derive(Debug)]
struct ObjectiveCoefficients {
    divisor: u64,
    makespan: i32,
    weights: Vec<i32>,
}

/// The objective coefficients of the makespan and of every job, divided by the smallest power of
/// two for which `sum(coefficients) * horizon` fits in an `i32`.
fn objective_coefficients(
    weights: &[f64],
    horizon: i32,
) -> Result<ObjectiveCoefficients, ModelError> {
    let mut divisor = 1_u64;

    loop {
        let scale = divisor as f64;
        let makespan = (f64::from(MAKESPAN_COEFFICIENT) / scale).round().max(1.0) as i32;

        if let Some(scaled) = weights
            .iter()
            .map(|&weight| scaled_weight(weight, scale))
            .collect::<Option<Vec<_>>>()
        {
            let total = scaled.iter().copied().map(i64::from).sum::<i64>() + i64::from(makespan);
            let fits = total
                .checked_mul(i64::from(horizon))
                .is_some_and(|bound| bound <= i64::from(i32::MAX));

            if fits {
                return Ok(ObjectiveCoefficients {
                    divisor,
                    makespan,
                    weights: scaled,
                });
            }
        }

        divisor = divisor.checked_mul(2).ok_or_else(|| {
            ModelError::WeightOverflow(weights.iter().copied().fold(0.0, f64::max))
        })?;
    }
}

fn scaled_weight(weight: f64, divisor: f64) -> Option<i32> {
    let scaled = (weight * WEIGHT_SCALE / divisor).round();
    (scaled.is_finite() && scaled >= f64::from(i32::MIN) && scaled <= f64::from(i32::MAX))
        .then_some(scaled as i32)
}

/// The model of a decomposition group, together with the variables needed to read a schedule
/// from a solution.
#[derive(Debug)]
pub struct GroupModel {
    model: Model,
    horizon: i32,
    objective_divisor: u64,
    makespan: IntVarId,
    job_ends: Vec<IntVarId>,
    operations: Vec<Vec<OperationVariables>>,
}

impl GroupModel {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn horizon(&self) -> i32 {
        self.horizon
    }

    /// The factor by which the objective coefficients were divided, see [`WEIGHT_SCALE`].
    pub fn objective_divisor(&self) -> u64 {
        self.objective_divisor
    }

    pub fn makespan(&self) -> IntVarId {
        self.makespan
    }

    /// The completion time variable of the job at `position` in the group.
    pub fn job_end(&self, position: usize) -> IntVarId {
        self.job_ends[position]
    }

    /// The variables of operation `operation` of the job at `position` in the group.
    pub fn operation(&self, position: usize, operation: usize) -> &OperationVariables {
        &self.operations[position][operation]
    }

    /// Read the schedule of the group from an assignment to its model, indexed by position in the
    /// group and then by operation.
    pub fn extract(&self, assignment: &Assignment) -> Vec<Vec<SolvedOperation>> {
        self.operations
            .iter()
            .map(|job| {
                job.iter()
                    .map(|operation| SolvedOperation {
                        start: assignment.integer_value(operation.start),
                        end: assignment.integer_value(operation.end),
                        slices: operation
                            .presences
                            .iter()
                            .enumerate()
                            .filter(|(_, &presence)| assignment.boolean_value(presence))
                            .map(|(slice, _)| slice)
                            .collect(),
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Operation;

    fn chain(weight: f64, operations: &[(u32, u32)]) -> Job {
        Job::new(
            weight,
            operations
                .iter()
                .enumerate()
                .map(|(index, &(slice_count, duration))| {
                    let dependencies = if index == 0 { vec![] } else { vec![index - 1] };
                    Operation::new(slice_count, duration, dependencies)
                })
                .collect(),
        )
    }

    fn count(model: &Model, predicate: impl Fn(&Constraint) -> bool) -> usize {
        model.constraints().iter().filter(|c| predicate(c)).count()
    }

    #[test]
    fn horizon_is_latest_availability_plus_total_duration() {
        let jobs = [chain(1.0, &[(1, 3), (1, 2)]), chain(1.0, &[(2, 4)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let mut availability = Availability::new(2);
        availability.occupy(1, 5);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");

        assert_eq!(group.horizon(), 5 + 3 + 2 + 4);
    }

    #[test]
    fn every_operation_gets_a_presence_and_interval_per_slice() {
        let jobs = [chain(1.0, &[(1, 3), (1, 2)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(3);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .with_options(ModelOptions {
                symmetry_breaking: false,
            })
            .build()
            .expect("valid group");
        let statistics = group.model().statistics();

        assert_eq!(statistics.num_intervals, 6);
        assert_eq!(statistics.num_booleans, 6);
        // start, end and the minimum slice index per operation, three per (operation, slice),
        // one per job and the makespan
        assert_eq!(statistics.num_integers, 2 * 3 + 2 * 3 * 3 + 1 + 1);
        assert_eq!(group.operation(0, 1).presences.len(), 3);
    }

    #[test]
    fn local_variables_start_at_the_slice_availability() {
        let jobs = [chain(1.0, &[(1, 3)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let mut availability = Availability::new(2);
        availability.occupy(0, 4);
        availability.occupy(1, 2);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let model = group.model();

        let lower_bounds = model
            .intervals()
            .iter()
            .map(|interval| model.domain(interval.start).lower_bound)
            .collect::<Vec<_>>();
        assert_eq!(lower_bounds, vec![4, 2]);
        assert_eq!(model.domain(group.operation(0, 0).start).lower_bound, 2);
    }

    #[test]
    fn resource_requirements_are_exact() {
        let jobs = [chain(1.0, &[(2, 3)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(3);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");

        let counts = group
            .model()
            .constraints()
            .iter()
            .filter_map(|constraint| match constraint {
                Constraint::ExactlyK { variables, count } => Some((variables.len(), *count)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![(3, 2)]);
    }

    #[test]
    fn no_overlap_is_only_posted_for_slices_shared_by_multiple_operations() {
        let jobs = [chain(1.0, &[(1, 3)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(2);
        let single = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");

        let jobs = [chain(1.0, &[(1, 3), (1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let double = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");

        let is_no_overlap = |c: &Constraint| matches!(c, Constraint::NoOverlap { .. });
        assert_eq!(count(single.model(), is_no_overlap), 0);
        assert_eq!(count(double.model(), is_no_overlap), 2);
    }

    #[test]
    fn precedence_orders_the_end_of_the_dependency_before_the_start() {
        let jobs = [chain(1.0, &[(1, 3), (1, 2)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");

        let expected = Constraint::Linear(LinearConstraint::binary_less_than_or_equals(
            group.operation(0, 0).end,
            group.operation(0, 1).start,
        ));
        assert!(group.model().constraints().contains(&expected));
    }

    #[test]
    fn symmetry_breaking_covers_every_pair_of_operations() {
        let jobs = [chain(1.0, &[(1, 1), (1, 1)]), chain(2.0, &[(1, 1), (1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(2);

        let with = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let without = GroupModelBuilder::new(&jobs, &availability)
            .with_options(ModelOptions {
                symmetry_breaking: false,
            })
            .build()
            .expect("valid group");

        // 4 operations give 6 pairs, each with one literal and three constraints
        let with = with.model().statistics();
        let without = without.model().statistics();
        assert_eq!(with.num_booleans - without.num_booleans, 6);
        assert_eq!(with.num_constraints - without.num_constraints, 18);
    }

    #[test]
    fn operations_without_slices_are_excluded_from_symmetry_breaking() {
        let jobs = [chain(1.0, &[(1, 1), (0, 0), (1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let with = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let without = GroupModelBuilder::new(&jobs, &availability)
            .with_options(ModelOptions {
                symmetry_breaking: false,
            })
            .build()
            .expect("valid group");

        assert_eq!(
            with.model().statistics().num_booleans - without.model().statistics().num_booleans,
            1
        );
    }

    #[test]
    fn operations_without_duration_are_excluded_from_symmetry_breaking() {
        let jobs = [chain(1.0, &[(1, 0), (1, 0), (1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let with = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let without = GroupModelBuilder::new(&jobs, &availability)
            .with_options(ModelOptions {
                symmetry_breaking: false,
            })
            .build()
            .expect("valid group");

        assert_eq!(
            with.model().statistics().num_booleans,
            without.model().statistics().num_booleans
        );
    }

    #[test]
    fn objective_weighs_makespan_and_rounded_job_weights() {
        let jobs = [chain(0.123_456, &[(1, 1)]), chain(2.0, &[(1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let objective = group.model().objective().expect("objective is set");

        assert_eq!(group.objective_divisor(), 1);
        assert_eq!(
            objective.terms,
            vec![
                LinearTerm::new(MAKESPAN_COEFFICIENT, group.makespan()),
                LinearTerm::new(1235, group.job_end(0)),
                LinearTerm::new(20_000, group.job_end(1)),
            ]
        );
    }

    #[test]
    fn objective_coefficients_are_divided_until_the_objective_fits() {
        let jobs = [chain(1.0, &[(1, 250_000)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let objective = group.model().objective().expect("objective is set");

        // (10000 + 10000) * 250000 exceeds i32::MAX, (2500 + 2500) * 250000 does not
        assert_eq!(group.objective_divisor(), 4);
        assert_eq!(
            objective.terms,
            vec![
                LinearTerm::new(2_500, group.makespan()),
                LinearTerm::new(2_500, group.job_end(0)),
            ]
        );
    }

    #[test]
    fn small_weights_keep_the_makespan_in_the_objective() {
        let weights = [0.001; 8];

        let coefficients = objective_coefficients(&weights, i32::MAX).expect("fits");

        assert_eq!(coefficients.makespan, 1);
        assert_eq!(coefficients.weights, vec![0; 8]);
    }

    #[test]
    fn large_weights_are_divided_rather_than_rejected() {
        let jobs = [chain(1e10, &[(1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");

        assert!(group.objective_divisor() > 1);
    }

    #[test]
    fn weights_which_do_not_fit_the_objective_are_rejected() {
        let jobs = [chain(f64::MAX, &[(1, 1)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(1);

        let result = GroupModelBuilder::new(&jobs, &availability).build();

        assert!(matches!(result, Err(ModelError::WeightOverflow(_))));
    }

    #[test]
    fn horizons_outside_the_time_range_are_rejected() {
        let jobs = [chain(1.0, &[(1, 2_000_000_000)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let mut availability = Availability::new(1);
        availability.occupy(0, 1_000_000_000);

        let result = GroupModelBuilder::new(&jobs, &availability).build();

        assert_eq!(
            result.unwrap_err(),
            ModelError::HorizonOverflow(3_000_000_000)
        );
    }

    #[test]
    fn extract_reads_start_times_and_present_slices() {
        let jobs = [chain(1.0, &[(2, 3)])];
        let jobs = jobs.iter().collect::<Vec<_>>();
        let availability = Availability::new(3);

        let group = GroupModelBuilder::new(&jobs, &availability)
            .build()
            .expect("valid group");
        let model = group.model();
        let variables = group.operation(0, 0);

        let mut integers = vec![0; model.num_integers()];
        integers[variables.start.index()] = 4;
        integers[variables.end.index()] = 7;
        let mut booleans = vec![false; model.num_booleans()];
        booleans[variables.presences[0].index()] = true;
        booleans[variables.presences[2].index()] = true;

        let solved = group.extract(&Assignment::new(integers, booleans));

        assert_eq!(
            solved,
            vec![vec![SolvedOperation {
                start: 4,
                end: 7,
                slices: vec![0, 2],
            }]]
        );
    }
}
