//! Schedules an instance group by group.
//!
//! Jobs are [prioritised](crate::priority::prioritise) and split into groups of at most
//! `group_size` jobs. The groups are solved one after the other, each against the
//! [`Availability`] left behind by the groups before it. Since the availability of a slice never
//! decreases, a later group can never conflict with an earlier one, but the schedule as a whole
//! is not necessarily optimal.

use std::num::NonZero;
use std::time::Duration;
use std::time::Instant;

use log::debug;
use log::info;
use log::warn;

use crate::availability::Availability;
use crate::engine::Engine;
use crate::engine::SolveStatus;
use crate::error::JobShopError;
use crate::error::JobShopResult;
use crate::instance::Instance;
use crate::model::GroupModelBuilder;
use crate::model::ModelOptions;
use crate::priority::prioritise;
use crate::schedule::Schedule;
use crate::schedule::ScheduleBuilder;
use crate::schedule::ScheduledOperation;

pub const DEFAULT_GROUP_SIZE: NonZero<usize> = match NonZero::new(8) {
    Some(group_size) => group_size,
    None => panic!("the default group size is zero"),
};
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(960);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompositionOptions {
    /// The maximum number of jobs solved together.
    pub group_size: NonZero<usize>,
    /// The time budget of the engine for every group.
    pub time_budget: Duration,
    pub model: ModelOptions,
}

impl Default for DecompositionOptions {
    fn default() -> Self {
        DecompositionOptions {
            group_size: DEFAULT_GROUP_SIZE,
            time_budget: DEFAULT_TIME_BUDGET,
            model: ModelOptions::default(),
        }
    }
}

/// How a single group was solved.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    /// The ids of the jobs in the group, in priority order.
    pub job_ids: Vec<usize>,
    pub status: SolveStatus,
    /// The objective value in the scaled coefficients of the group model.
    pub objective_value: Option<i64>,
    /// The factor by which the objective coefficients of the group were divided to keep the
    /// objective in the range of the engine, see [`WEIGHT_SCALE`](crate::model::WEIGHT_SCALE).
    pub objective_divisor: u64,
    /// The availability of the slices once the group is scheduled.
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub schedule: Schedule,
    pub groups: Vec<GroupReport>,
}

/// Schedule every job of `instance`, solving groups of jobs with `engine`.
///
/// Fails as soon as a group cannot be solved: a schedule for only some of the jobs is never
/// returned.
pub fn decompose(
    instance: &Instance,
    options: &DecompositionOptions,
    engine: &mut impl Engine,
) -> JobShopResult<Decomposition> {
    let prioritised = prioritise(instance.jobs())?;

    let mut availability = Availability::new(instance.num_slices());
    let mut schedule = ScheduleBuilder::new(instance.jobs().len());
    let mut groups = vec![];

    let group_size = options.group_size.get();
    for (group, (jobs, job_ids)) in prioritised
        .jobs()
        .chunks(group_size)
        .zip(prioritised.original_ids().chunks(group_size))
        .enumerate()
    {
        let start_time = Instant::now();
        debug!(
            "Solving group {group} with jobs {job_ids:?} against availability {:?}",
            availability.as_slice()
        );

        let group_model = GroupModelBuilder::new(jobs, &availability)
            .with_options(options.model)
            .build()
            .map_err(|source| JobShopError::Model { group, source })?;
        debug!(
            "Group {group} has horizon {} and objective divisor {}",
            group_model.horizon(),
            group_model.objective_divisor()
        );

        let outcome = engine
            .solve(group_model.model(), options.time_budget)
            .map_err(|source| JobShopError::Engine { group, source })?;

        let Some(assignment) = outcome.usable_assignment() else {
            return Err(JobShopError::Scheduling {
                group,
                job_ids: job_ids.to_vec(),
                status: outcome.status,
            });
        };

        info!(
            "Group {group} ({} jobs): {} with objective {:?} in {:.3}s",
            jobs.len(),
            outcome.status,
            outcome.objective_value,
            start_time.elapsed().as_secs_f64()
        );
        if outcome.status == SolveStatus::Feasible {
            warn!("Group {group} was not solved to optimality within the time budget");
        }

        for (&job_id, solved_job) in job_ids.iter().zip(group_model.extract(assignment)) {
            let operations = solved_job
                .into_iter()
                .map(|solved| {
                    for &slice in &solved.slices {
                        availability.occupy(slice, solved.end);
                    }

                    ScheduledOperation {
                        start: solved.start,
                        slices: solved.slices,
                    }
                })
                .collect();
            schedule.insert(job_id, operations);
        }

        groups.push(GroupReport {
            job_ids: job_ids.to_vec(),
            status: outcome.status,
            objective_value: outcome.objective_value,
            objective_divisor: group_model.objective_divisor(),
            availability: availability.clone(),
        });
    }

    Ok(Decomposition {
        schedule: schedule.finish()?,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::engine::SolveOutcome;
    use crate::instance::Job;
    use crate::instance::Operation;
    use crate::model::Model;

    /// An engine which always reports the same status without a solution.
    #[derive(Debug)]
    struct Failing {
        status: SolveStatus,
        calls: usize,
    }

    impl Engine for Failing {
        fn solve(&mut self, _: &Model, _: Duration) -> Result<SolveOutcome, EngineError> {
            self.calls += 1;
            Ok(SolveOutcome {
                status: self.status,
                assignment: None,
                objective_value: None,
            })
        }
    }

    fn instance() -> Instance {
        Instance::new(
            2,
            vec![
                Job::new(1.0, vec![Operation::new(1, 2, vec![])]),
                Job::new(4.0, vec![Operation::new(1, 2, vec![])]),
            ],
        )
    }

    #[test]
    fn infeasible_groups_abort_the_decomposition() {
        let mut engine = Failing {
            status: SolveStatus::Infeasible,
            calls: 0,
        };

        let result = decompose(&instance(), &DecompositionOptions::default(), &mut engine);

        assert!(matches!(
            result,
            Err(JobShopError::Scheduling {
                group: 0,
                status: SolveStatus::Infeasible,
                ..
            })
        ));
        assert_eq!(engine.calls, 1);
    }

    #[test]
    fn unknown_groups_abort_at_the_first_group_in_priority_order() {
        let mut engine = Failing {
            status: SolveStatus::Unknown,
            calls: 0,
        };
        let options = DecompositionOptions {
            group_size: NonZero::new(1).expect("non-zero"),
            ..DecompositionOptions::default()
        };

        let result = decompose(&instance(), &options, &mut engine);

        match result {
            Err(JobShopError::Scheduling {
                group,
                job_ids,
                status,
            }) => {
                assert_eq!(group, 0);
                assert_eq!(job_ids, vec![1]);
                assert_eq!(status, SolveStatus::Unknown);
            }
            other => panic!("expected a scheduling error, got {other:?}"),
        }
        assert_eq!(engine.calls, 1);
    }

    #[test]
    fn a_solution_with_a_non_usable_status_is_ignored() {
        #[derive(Debug)]
        struct Lying;

        impl Engine for Lying {
            fn solve(&mut self, model: &Model, _: Duration) -> Result<SolveOutcome, EngineError> {
                Ok(SolveOutcome {
                    status: SolveStatus::Unknown,
                    assignment: Some(crate::engine::Assignment::new(
                        vec![0; model.num_integers()],
                        vec![false; model.num_booleans()],
                    )),
                    objective_value: None,
                })
            }
        }

        let result = decompose(&instance(), &DecompositionOptions::default(), &mut Lying);

        assert!(matches!(result, Err(JobShopError::Scheduling { .. })));
    }

    #[test]
    fn engine_errors_are_propagated_with_their_group() {
        #[derive(Debug)]
        struct Broken;

        impl Engine for Broken {
            fn solve(&mut self, _: &Model, _: Duration) -> Result<SolveOutcome, EngineError> {
                Err(EngineError::Failed("no result".to_owned()))
            }
        }

        let result = decompose(&instance(), &DecompositionOptions::default(), &mut Broken);

        assert!(matches!(result, Err(JobShopError::Engine { group: 0, .. })));
    }

    #[test]
    fn degenerate_jobs_are_rejected_before_solving() {
        let instance = Instance::new(
            1,
            vec![Job::new(1.0, vec![Operation::new(0, 0, vec![])])],
        );
        let mut engine = Failing {
            status: SolveStatus::Infeasible,
            calls: 0,
        };

        let result = decompose(&instance, &DecompositionOptions::default(), &mut engine);

        assert!(matches!(result, Err(JobShopError::DegenerateJob(_))));
        assert_eq!(engine.calls, 0);
    }
}
